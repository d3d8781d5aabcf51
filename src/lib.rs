//! Template-driven caching reverse proxy library.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{ConfigurationError, ProxyError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
