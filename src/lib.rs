pub mod audit;
pub mod config;
pub mod prompts;
pub mod proxy;
pub mod transform;
