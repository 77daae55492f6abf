//! Connection pool configuration for upstream requests.

use std::time::Duration;

use crate::config::Transport;

/// Pool configuration for upstream requests.
///
/// Requests are never retried, so there is no backoff here.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Idle timeout for pooled connections.
    pub pool_idle_timeout: Duration,
    /// Max idle connections kept for the upstream host.
    pub pool_max_idle_per_host: usize,
}

impl PoolConfig {
    /// Create a new pool configuration with explicit values.
    pub fn new(pool_idle_timeout_secs: u64, pool_max_idle_per_host: usize) -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(pool_idle_timeout_secs),
            pool_max_idle_per_host,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&Transport::default())
    }
}

impl From<&Transport> for PoolConfig {
    fn from(transport: &Transport) -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(transport.pool_idle_timeout_seconds.into()),
            pool_max_idle_per_host: transport.pool_max_idle_per_host as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.pool_max_idle_per_host, 10);
    }

    #[test]
    fn test_custom_pool_config() {
        let config = PoolConfig::new(10, 2);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_max_idle_per_host, 2);
    }
}
