//! Downstream credential check.

use axum::http::{header, HeaderMap};

/// Checks the caller's credential against the configured secret.
///
/// Headers are consulted in order and the first one present decides:
///
/// - `Authorization: Bearer <token>` passes only when the token matches.
/// - `Authorization: <secret>` passes; any other non-Bearer value falls
///   through to the next header.
/// - `x-api-key` (any capitalization, first occurrence) must match.
///
/// Comparison is plain string equality.
#[derive(Debug, Clone)]
pub struct AuthValidator {
    secret: String,
}

impl AuthValidator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        if let Some(authorization) = first_value(headers, header::AUTHORIZATION.as_str()) {
            if let Some(token) = authorization.strip_prefix("Bearer ") {
                return token == self.secret;
            }
            if authorization == self.secret {
                return true;
            }
        }

        match first_value(headers, "x-api-key") {
            Some(api_key) => api_key == self.secret,
            None => false,
        }
    }
}

/// First value of `name`, if it is present, readable and non-empty.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
