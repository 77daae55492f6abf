use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method};
use reqwest::Client;

use crate::config::{build_auth_header, Upstream};
use crate::proxy::error::ProxyError;
use crate::proxy::pool::PoolConfig;
use crate::proxy::timeout::TimeoutConfig;

/// Headers the first-party CLI sends. Every outbound request carries exactly
/// these plus `Authorization`; nothing from the caller is forwarded.
pub const CLI_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json"),
    ("x-stainless-retry-count", "0"),
    ("x-stainless-timeout", "600"),
    ("x-stainless-lang", "js"),
    ("x-stainless-package-version", "0.60.0"),
    ("x-stainless-os", "Windows"),
    ("x-stainless-arch", "x64"),
    ("x-stainless-runtime", "node"),
    ("x-stainless-runtime-version", "v22.13.0"),
    ("anthropic-dangerous-direct-browser-access", "true"),
    ("anthropic-version", "2023-06-01"),
    ("x-app", "cli"),
    ("user-agent", "claude-cli/1.0.108 (external, cli)"),
    ("content-type", "application/json"),
    (
        "anthropic-beta",
        "claude-code-20250219,interleaved-thinking-2025-05-14,fine-grained-tool-streaming-2025-05-14",
    ),
    ("x-stainless-helper-method", "stream"),
    ("accept-language", "*"),
    ("sec-fetch-mode", "cors"),
];

/// Build the full outbound header set for the given upstream.
pub fn cli_headers(upstream: &Upstream) -> Result<HeaderMap, ProxyError> {
    let mut headers = HeaderMap::with_capacity(CLI_HEADERS.len() + 1);
    for &(name, value) in CLI_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let (name, value) = build_auth_header(upstream);
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ProxyError::UpstreamRequest(format!("invalid auth header name: {}", e)))?;
    let mut value = HeaderValue::from_str(&value).map_err(|_| {
        ProxyError::UpstreamRequest("upstream key is not a valid header value".to_string())
    })?;
    value.set_sensitive(true);
    headers.insert(name, value);

    Ok(headers)
}

pub struct UpstreamClient {
    client: Client,
    url: String,
    headers: HeaderMap,
    timeout_config: TimeoutConfig,
}

impl UpstreamClient {
    pub fn new(
        upstream: &Upstream,
        timeout_config: TimeoutConfig,
        pool_config: PoolConfig,
    ) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .tcp_nodelay(true)
            .tcp_keepalive(timeout_config.tcp_keepalive)
            .http1_only()
            .http1_title_case_headers()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .connect_timeout(timeout_config.connection_setup())
            .timeout(timeout_config.request)
            .pool_idle_timeout(Some(pool_config.pool_idle_timeout))
            .pool_max_idle_per_host(pool_config.pool_max_idle_per_host)
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build upstream client: {}", e)))?;

        Ok(Self {
            client,
            url: upstream.url.clone(),
            headers: cli_headers(upstream)?,
            timeout_config,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The exact headers every outbound request carries.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Send `body` upstream with the caller's method and wait for the
    /// response head. The body is left unread.
    pub async fn send(&self, method: Method, body: Vec<u8>) -> Result<reqwest::Response, ProxyError> {
        let request = self
            .client
            .request(method, &self.url)
            .headers(self.headers.clone())
            .body(body)
            .build()
            .map_err(|e| ProxyError::UpstreamRequest(e.to_string()))?;

        let header_timeout = self.timeout_config.response_header;
        match tokio::time::timeout(header_timeout, self.client.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) if err.is_timeout() => Err(ProxyError::UpstreamTimeout(
                self.timeout_config.request.as_secs(),
            )),
            Ok(Err(err)) => Err(ProxyError::UpstreamUnreachable(err)),
            Err(_) => Err(ProxyError::UpstreamTimeout(header_timeout.as_secs())),
        }
    }
}
