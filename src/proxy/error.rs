//! Request-level errors and their outward responses.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::transform::TransformError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("authentication failed")]
    Unauthorized,

    /// Malformed `system` field. Rendered exactly like [`ProxyError::Unauthorized`].
    #[error("request format anomaly: `system` must be an array")]
    FormatAnomaly,

    #[error("failed to read request body: {0}")]
    BadRequest(String),

    #[error("failed to transform request body: {0}")]
    Transform(#[source] TransformError),

    #[error("failed to build upstream request: {0}")]
    UpstreamRequest(String),

    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("upstream sent no response headers within {0}s")]
    UpstreamTimeout(u64),

    #[error("failed to read upstream response body: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TransformError> for ProxyError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::FormatAnomaly => ProxyError::FormatAnomaly,
            other => ProxyError::Transform(other),
        }
    }
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized | ProxyError::FormatAnomaly => StatusCode::UNAUTHORIZED,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transform(_) | ProxyError::UpstreamRequest(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::UpstreamTimeout(_)
            | ProxyError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Error type for the response envelope. A format anomaly reports as
    /// an authentication error.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized | ProxyError::FormatAnomaly => "authentication_error",
            ProxyError::BadRequest(_) => "invalid_request_error",
            ProxyError::Transform(_) | ProxyError::UpstreamRequest(_) | ProxyError::Internal(_) => {
                "api_error"
            }
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::UpstreamTimeout(_)
            | ProxyError::UpstreamBody(_) => "upstream_error",
        }
    }

    /// Message shown to the caller. Authentication failures never explain
    /// themselves.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::Unauthorized | ProxyError::FormatAnomaly => "Unauthorized".to_string(),
            other => other.to_string(),
        }
    }
}

pub struct ErrorResponse;

impl ErrorResponse {
    pub fn from_error(err: &ProxyError) -> Response {
        let body = json!({
            "type": "error",
            "error": {
                "type": err.error_type(),
                "message": err.public_message(),
            }
        });

        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = err.status_code();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        ErrorResponse::from_error(&self)
    }
}
