//! Request-level error taxonomy.
//!
//! Every failure a single proxied request can hit maps to exactly one
//! variant here, and every variant maps to exactly one HTTP status. Startup
//! failures live in [`ConfigurationError`] and never reach a client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced to a caller of the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Requested route name is not registered.
    #[error("Unknown service: {0}")]
    UnknownRoute(String),

    /// Segment layout cannot be resolved into parameters.
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// A placeholder of the route's template never received a value.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// The allow-list rejected the resolved parameters.
    #[error("Parameters not allowed")]
    NotAuthorized,

    /// The upstream answered with a non-2xx status.
    #[error("Upstream returned status {0}")]
    UpstreamFailure(StatusCode),

    /// The upstream could not be reached at all.
    #[error("Upstream fetch failed: {0}")]
    Fetch(String),

    /// Missing or invalid bearer token on a management endpoint.
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    /// Server-side failure outside the request path (e.g. cache I/O
    /// during a management call).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnknownRoute(_)
            | ProxyError::MalformedPath(_)
            | ProxyError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotAuthorized => StatusCode::FORBIDDEN,
            ProxyError::UpstreamFailure(status) => *status,
            ProxyError::Fetch(_) | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UnknownRoute(_) => "unknown_route",
            ProxyError::MalformedPath(_) => "malformed_path",
            ProxyError::MissingParameter(_) => "missing_parameter",
            ProxyError::NotAuthorized => "not_authorized",
            ProxyError::UpstreamFailure(_) => "upstream_failure",
            ProxyError::Fetch(_) => "fetch_error",
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Network and I/O error text stays in the logs.
        let body = match &self {
            ProxyError::Fetch(_) => "Failed to fetch upstream resource".to_string(),
            ProxyError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

/// Fatal startup error: the process must refuse to start.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("exactly one of `pattern` or `patterns` must be configured")]
    PatternSource,

    #[error("malformed pattern entry '{0}': expected name=template")]
    MalformedEntry(String),

    #[error("invalid route name '{0}': only letters, digits, '_' and '-' are allowed")]
    InvalidRouteName(String),

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("invalid cache annotation '{annotation}' on route '{route}'")]
    CacheAnnotation { route: String, annotation: String },

    #[error("route '{route}': {reason}")]
    Template { route: String, reason: String },

    #[error("invalid allow-list pattern '{pattern}' for parameter '{param}': {reason}")]
    AllowPattern {
        param: String,
        pattern: String,
        reason: String,
    },
}
