use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::admin::auth::AdminAuth;
use crate::error::ProxyError;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct InvalidateResult {
    pub route: String,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct CleanupResult {
    pub deleted: usize,
}

/// `DELETE /invalidate-cache/{route}`: drop every cached entry of one route.
pub async fn invalidate_cache(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(route): Path<String>,
) -> Result<Json<InvalidateResult>, ProxyError> {
    if state.registry.get(&route).is_none() {
        return Err(ProxyError::UnknownRoute(route));
    }

    let deleted = state.cache.invalidate_route(&route).await.map_err(|e| {
        tracing::error!(route = %route, error = %e, "Cache invalidation failed");
        ProxyError::Internal(e.to_string())
    })?;

    Ok(Json(InvalidateResult { route, deleted }))
}

/// `POST /cleanup-cache`: run an expiry sweep now.
pub async fn cleanup_cache(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Json<CleanupResult> {
    let deleted = state.cache.sweep_expired().await;
    tracing::info!(deleted, "Manual cache cleanup complete");
    Json(CleanupResult { deleted })
}
