// proxy module - session-aware reverse proxy to the backend API

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod session;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::ProxyError;
pub use server::{build_router, AppState, GatewayServer};
