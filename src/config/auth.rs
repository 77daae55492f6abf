//! Authentication header building for upstream requests.
//!
//! The upstream secret always travels as a bearer token; whatever the
//! caller sent is never forwarded.

use super::types::Upstream;

/// Header name and value for authentication.
pub type AuthHeader = (&'static str, String);

/// Build the `Authorization` header for the configured upstream.
pub fn build_auth_header(upstream: &Upstream) -> AuthHeader {
    ("Authorization", format!("Bearer {}", upstream.key))
}
