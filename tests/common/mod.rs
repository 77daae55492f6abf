#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use mimic_gateway::config::{parse_config, Config};
use mimic_gateway::prompts::PromptRegistry;
use mimic_gateway::proxy::shutdown::ShutdownManager;
use mimic_gateway::proxy::{build_router, GatewayEngine};

pub const GATEWAY_KEY: &str = "gateway-secret";
pub const UPSTREAM_KEY: &str = "sk-upstream-key";
pub const BUFFERED_REPLY: &str = r#"{"id":"msg_01","type":"message","content":[]}"#;

/// A request as the fake upstream received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("upstream body should be JSON")
    }
}

#[derive(Clone, Default)]
struct FakeState {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Axum server standing in for the upstream API.
///
/// - `/ok` replies 200 with [`BUFFERED_REPLY`]
/// - `/fail` replies 500
/// - `/stream` replies 200 with [`stream_payload`] split into uneven chunks
/// - `/broken` sends part of a body, then errors
pub struct FakeUpstream {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let state = FakeState::default();
        let app = Router::new()
            .route("/ok", any(ok_handler))
            .route("/fail", any(fail_handler))
            .route("/stream", any(stream_handler))
            .route("/broken", any(broken_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("fake upstream addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            captured: state.captured,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().clone()
    }
}

async fn capture(state: &FakeState, req: Request<Body>) {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.expect("read body").to_bytes();
    state.captured.lock().push(CapturedRequest {
        method: parts.method,
        headers: parts.headers,
        body,
    });
}

async fn ok_handler(State(state): State<FakeState>, req: Request<Body>) -> Response {
    capture(&state, req).await;
    (
        StatusCode::OK,
        [("content-type", "application/json"), ("x-upstream", "fake")],
        BUFFERED_REPLY,
    )
        .into_response()
}

async fn fail_handler(State(state): State<FakeState>, req: Request<Body>) -> Response {
    capture(&state, req).await;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [("content-type", "application/json")],
        r#"{"type":"error","error":{"type":"api_error","message":"boom"}}"#,
    )
        .into_response()
}

/// Event-stream payload larger than one relay chunk.
pub fn stream_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    for i in 0..300 {
        payload.extend_from_slice(
            format!(
                "event: content_block_delta\ndata: {{\"index\":{},\"delta\":{{\"text\":\"片段-{}\"}}}}\n\n",
                i, i
            )
            .as_bytes(),
        );
    }
    payload
}

async fn stream_handler(State(state): State<FakeState>, req: Request<Body>) -> Response {
    capture(&state, req).await;
    let payload = stream_payload();
    let chunks: Vec<Result<Bytes, Infallible>> = payload
        .chunks(5000)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    (
        StatusCode::OK,
        [("content-type", "text/event-stream")],
        Body::from_stream(futures_util::stream::iter(chunks)),
    )
        .into_response()
}

async fn broken_handler(State(state): State<FakeState>, req: Request<Body>) -> Response {
    capture(&state, req).await;
    let first = futures_util::stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(
        b"event: message_start\n\n",
    ))]);
    let failure = futures_util::stream::once(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(std::io::Error::other("upstream went away"))
    });
    (
        StatusCode::OK,
        [("content-type", "text/event-stream")],
        Body::from_stream(first.chain(failure)),
    )
        .into_response()
}

/// Temporary audit and prompt directories for one test.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self, upstream_url: &str) -> Config {
        let raw = format!(
            r#"
[upstream]
url = '{url}'
key = '{upstream_key}'

[server]
port = 8080

[auth]
key = '{gateway_key}'

[gateway]
user_id = 'user_test_account__session_fixed'
prompt_dir = '{prompts}'

[audit]
success_dir = '{logs}'
failure_dir = '{errors}'
"#,
            url = upstream_url,
            upstream_key = UPSTREAM_KEY,
            gateway_key = GATEWAY_KEY,
            prompts = self.path("system_prompt").display(),
            logs = self.path("logs").display(),
            errors = self.path("errors").display(),
        );
        parse_config(&raw).expect("test config should parse")
    }

    pub fn success_records(&self) -> Vec<Value> {
        read_records(&self.path("logs"))
    }

    pub fn failure_records(&self) -> Vec<Value> {
        read_records(&self.path("errors"))
    }

    /// Poll until an audit record lands in either bucket.
    pub async fn wait_for_record(&self) -> Value {
        for _ in 0..100 {
            if let Some(record) = self
                .success_records()
                .into_iter()
                .chain(self.failure_records())
                .next()
            {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no audit record was written");
    }
}

fn read_records(dir: &Path) -> Vec<Value> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read(entry.path()).ok())
        .filter_map(|raw| serde_json::from_slice(&raw).ok())
        .collect()
}

pub fn gateway(config: &Config, prompts: PromptRegistry) -> Router {
    let engine = GatewayEngine::new(config, prompts, Arc::new(ShutdownManager::new()))
        .expect("engine should build");
    build_router(engine)
}

pub fn messages_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .header("x-api-key", GATEWAY_KEY)
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_bytes(response: Response) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes()
}
