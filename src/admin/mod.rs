//! Cache management API.
//!
//! # Endpoints
//! - `DELETE /invalidate-cache/{route}` → `{"route": .., "deleted": n}`
//! - `POST /cleanup-cache` → `{"deleted": n}`
//!
//! Both require `Authorization: Bearer <admin.api_key>`. Routes are mounted
//! by `http::server::HttpServer`.

pub mod auth;
pub mod handlers;

pub use auth::AdminAuth;
