//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header shared by the ID layers and the trace span
//! - Read the request ID back out of a header map
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - Incoming `x-request-id` values are kept, not replaced

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, Request},
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request ID set by `SetRequestIdLayer`.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Span for one HTTP request, used by the router's `TraceLayer`.
pub fn make_request_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request.headers().request_id(),
    )
}
