//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, handlers)
//!     → request.rs (request ID, trace span)
//!     → pipeline.rs (route → parameters → allow-list → URL → cache)
//!     → upstream.rs (GET on cache miss)
//!     → response.rs (content type, disposition, cache headers)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use pipeline::{CacheStatus, Pipeline, ProxyResponse};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
pub use upstream::UpstreamClient;
