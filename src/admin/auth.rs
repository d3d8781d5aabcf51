//! Bearer-token guard for the cache management endpoints.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ProxyError;
use crate::http::server::AppState;

/// Extractor that only succeeds for `Authorization: Bearer <admin.api_key>`.
///
/// With no key configured every request is rejected.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ProxyError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(key) = state.admin_key.as_deref() else {
            return Err(ProxyError::Unauthorized);
        };

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(auth_val) if auth_val == format!("Bearer {}", key) => Ok(AdminAuth),
            _ => Err(ProxyError::Unauthorized),
        }
    }
}
