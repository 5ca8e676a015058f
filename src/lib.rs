//! Rate-limiting reverse-proxy gateway library.

pub mod admin;
pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod limiter;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use limiter::RateLimiter;
