//! Configuration loading and validation.
//!
//! The file is read once at startup; the resulting [`Config`] is shared
//! read-only behind an `Arc` for the rest of the process.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::identity::generate_user_id;
use super::types::Config;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load, validate and complete the configuration at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw)
}

/// Parse configuration from TOML text.
///
/// An empty `gateway.user_id` is replaced by a freshly generated identity,
/// which is logged once so operators can pin it in the file if desired.
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(raw)?;
    validate(&config)?;

    if config.gateway.user_id.trim().is_empty() {
        config.gateway.user_id = generate_user_id();
        tracing::info!(
            user_id = %config.gateway.user_id,
            "gateway.user_id is empty, generated one"
        );
    }

    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.upstream.url.trim().is_empty() {
        return Err(ConfigError::Invalid("upstream.url must not be empty".into()));
    }
    if config.upstream.key.trim().is_empty() {
        return Err(ConfigError::Invalid("upstream.key must not be empty".into()));
    }
    if config.server.port == 0 {
        return Err(ConfigError::Invalid(
            "server.port must be between 1 and 65535".into(),
        ));
    }
    if config.auth.key.is_empty() {
        return Err(ConfigError::Invalid("auth.key must not be empty".into()));
    }
    Ok(())
}
