use std::collections::BTreeMap;
use std::fmt;

use axum::http::HeaderMap;
use serde::Serialize;
use uuid::Uuid;

use super::encoding::repair_utf8;
use super::redaction::header_snapshot;

/// Four-digit tag used to correlate log lines of one request.
///
/// Not unique; collisions between concurrent requests are possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(format!("{:04}", Uuid::new_v4().as_u128() % 10_000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Only an exact 200 counts as success; other 2xx codes do not.
pub fn is_success_status(status: u16) -> bool {
    status == 200
}

#[derive(Debug, Clone, Serialize)]
pub struct DownstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub original_body: String,
    pub transformed_body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Snapshot of one exchange, filled in as the request progresses and
/// written once at the end.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub task_id: String,
    pub timestamp: String,
    pub downstream_request: DownstreamRequest,
    pub upstream_request: Option<UpstreamRequest>,
    pub upstream_response: Option<UpstreamResponse>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn new(task_id: &TaskId, method: &str, url: &str, headers: &HeaderMap) -> Self {
        Self {
            task_id: task_id.to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            downstream_request: DownstreamRequest {
                method: method.to_string(),
                url: url.to_string(),
                headers: header_snapshot(headers),
                body: String::new(),
            },
            upstream_request: None,
            upstream_response: None,
            success: false,
            error: None,
        }
    }

    pub fn set_downstream_body(&mut self, body: &[u8]) {
        self.downstream_request.body = repair_utf8(body);
    }

    pub fn record_upstream_request(
        &mut self,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        original_body: &[u8],
        transformed_body: &[u8],
    ) {
        self.upstream_request = Some(UpstreamRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: header_snapshot(headers),
            original_body: repair_utf8(original_body),
            transformed_body: repair_utf8(transformed_body),
        });
    }

    pub fn record_upstream_response(&mut self, status_code: u16, headers: &HeaderMap) {
        self.upstream_response = Some(UpstreamResponse {
            status_code,
            headers: header_snapshot(headers),
            body: String::new(),
        });
    }

    /// Store the relayed body and settle `success` from the upstream status.
    pub fn complete(&mut self, body: &[u8]) {
        let Some(response) = self.upstream_response.as_mut() else {
            self.fail("upstream response missing");
            return;
        };
        response.body = repair_utf8(body);
        let status = response.status_code;
        self.success = is_success_status(status);
        if !self.success {
            self.error = Some(format!("upstream returned status {status}"));
        }
    }

    /// Mark the exchange failed. Keeps any body captured so far.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.success = false;
        self.error = Some(error.to_string());
    }

    /// Like [`fail`](Self::fail), also storing whatever body was relayed.
    pub fn fail_with_body(&mut self, body: &[u8], error: impl fmt::Display) {
        if let Some(response) = self.upstream_response.as_mut() {
            response.body = repair_utf8(body);
        }
        self.fail(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuditRecord {
        AuditRecord::new(
            &TaskId::generate(),
            "POST",
            "/v1/messages",
            &HeaderMap::new(),
        )
    }

    #[test]
    fn task_id_is_four_digits() {
        for _ in 0..100 {
            let id = TaskId::generate();
            assert_eq!(id.as_str().len(), 4);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn only_exact_200_is_success() {
        assert!(is_success_status(200));
        assert!(!is_success_status(201));
        assert!(!is_success_status(204));
        assert!(!is_success_status(500));
    }

    #[test]
    fn complete_with_error_status_sets_error() {
        let mut record = record();
        record.record_upstream_response(500, &HeaderMap::new());
        record.complete(b"{\"type\":\"error\"}");
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("upstream returned status 500"));
        assert_eq!(record.upstream_response.unwrap().body, "{\"type\":\"error\"}");
    }

    #[test]
    fn complete_with_200_is_success() {
        let mut record = record();
        record.record_upstream_response(200, &HeaderMap::new());
        record.complete(b"ok");
        assert!(record.success);
        assert!(record.error.is_none());
    }

    #[test]
    fn unreached_stages_serialize_as_null() {
        let mut record = record();
        record.fail("unauthorized");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["upstream_request"].is_null());
        assert!(value["upstream_response"].is_null());
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "unauthorized");
    }
}
