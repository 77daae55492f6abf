use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub upstream: Upstream,
    #[serde(default)]
    pub server: Server,
    pub auth: Auth,
    #[serde(default)]
    pub gateway: Gateway,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub transport: Transport,
}

/// The single upstream endpoint every request is relayed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upstream {
    /// Full URL of the messages endpoint. Used as-is, no path joining.
    pub url: String,
    /// Secret sent upstream as `Authorization: Bearer <key>`.
    pub key: String,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period for in-flight requests on shutdown (default: 30).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

/// Downstream credential check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    pub key: String,
}

/// Identity and prompt settings used by the body rewriter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    /// Value written to `metadata.user_id`. Generated at load time when empty.
    #[serde(default)]
    pub user_id: String,
    /// Directory holding `<model>.txt` prompt files (default: "system_prompt").
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: String,
}

/// Where audit records are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default = "default_success_dir")]
    pub success_dir: String,
    #[serde(default = "default_failure_dir")]
    pub failure_dir: String,
    /// Offset from UTC used for audit file names (default: 8).
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

/// Upstream transport tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    /// TCP dial timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    /// TLS handshake timeout in seconds (default: 15).
    #[serde(default = "default_tls_handshake_timeout")]
    pub tls_handshake_timeout_seconds: u32,
    /// Time allowed between sending the request and receiving headers (default: 90).
    #[serde(default = "default_response_header_timeout")]
    pub response_header_timeout_seconds: u32,
    /// Overall request timeout in seconds (default: 600).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
    /// TCP keepalive interval in seconds (default: 30).
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_seconds: u32,
    /// Pool idle timeout in seconds (default: 90).
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_seconds: u32,
    /// Max idle connections per host (default: 10).
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_prompt_dir() -> String {
    "system_prompt".to_string()
}

fn default_success_dir() -> String {
    "logs".to_string()
}

fn default_failure_dir() -> String {
    "errors".to_string()
}

fn default_utc_offset() -> i32 {
    8
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_tls_handshake_timeout() -> u32 {
    15
}

fn default_response_header_timeout() -> u32 {
    90
}

fn default_request_timeout() -> u32 {
    600
}

fn default_tcp_keepalive() -> u32 {
    30
}

fn default_pool_idle_timeout() -> u32 {
    90
}

fn default_pool_max_idle_per_host() -> u32 {
    10
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            prompt_dir: default_prompt_dir(),
        }
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self {
            success_dir: default_success_dir(),
            failure_dir: default_failure_dir(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            tls_handshake_timeout_seconds: default_tls_handshake_timeout(),
            response_header_timeout_seconds: default_response_header_timeout(),
            request_timeout_seconds: default_request_timeout(),
            tcp_keepalive_seconds: default_tcp_keepalive(),
            pool_idle_timeout_seconds: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}
