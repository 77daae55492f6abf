pub mod auth;
pub mod error;
pub mod health;
pub mod pool;
pub mod relay;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod timeout;
pub mod tracing;
pub mod upstream;

pub use router::{build_router, GatewayEngine};
pub use server::{GatewayHandle, GatewayServer};
