mod auth;
mod identity;
mod loader;
mod types;

pub use auth::{build_auth_header, AuthHeader};
pub use identity::generate_user_id;
pub use loader::{load_config, parse_config, ConfigError};
pub use types::{Audit, Auth, Config, Gateway, Server, Transport, Upstream};
