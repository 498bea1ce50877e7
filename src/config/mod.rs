pub mod schema;

pub use schema::{Config, GatewayConfig, ModelConfig, SessionConfig, SessionLocation};
