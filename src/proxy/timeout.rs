//! Timeout configuration for upstream requests.
//!
//! Each phase of an upstream exchange has its own bound: dialing, the TLS
//! handshake, waiting for response headers, and the request as a whole.

use crate::config::Transport;
use std::time::Duration;

/// Timeout configuration for upstream requests
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Time to establish the TCP connection
    pub connect: Duration,
    /// Time to complete the TLS handshake
    pub tls_handshake: Duration,
    /// Time from sending the request until response headers arrive
    pub response_header: Duration,
    /// Total time for the complete request/response, body included
    pub request: Duration,
    /// TCP keepalive interval on upstream connections
    pub tcp_keepalive: Duration,
}

impl TimeoutConfig {
    /// Bound applied to connection setup; the client enforces dial and
    /// handshake together.
    pub fn connection_setup(&self) -> Duration {
        self.connect + self.tls_handshake
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from(&Transport::default())
    }
}

impl From<&Transport> for TimeoutConfig {
    fn from(transport: &Transport) -> Self {
        Self {
            connect: Duration::from_secs(transport.connect_timeout_seconds.into()),
            tls_handshake: Duration::from_secs(transport.tls_handshake_timeout_seconds.into()),
            response_header: Duration::from_secs(
                transport.response_header_timeout_seconds.into(),
            ),
            request: Duration::from_secs(transport.request_timeout_seconds.into()),
            tcp_keepalive: Duration::from_secs(transport.tcp_keepalive_seconds.into()),
        }
    }
}
