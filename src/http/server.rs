//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build registry, allow-list, cache and upstream client from config
//! - Create Axum Router with proxy and cache management handlers
//! - Wire up middleware (request ID, tracing, CORS header, timeout)
//! - Run the cache sweeper alongside the server
//! - Serve until the shutdown broadcast fires
//!
//! # Design Decisions
//! - Management paths also route `GET` to the proxy so they never shadow
//!   a proxied path
//! - `Access-Control-Allow-Origin: *` is set by a layer so errors carry it

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::handlers::{cleanup_cache, invalidate_cache};
use crate::cache::{build_store, CacheStore, CacheSweeper, Clock, ResponseCache, SystemClock};
use crate::config::{loader::ConfigError, ProxyConfig};
use crate::http::pipeline::Pipeline;
use crate::http::request::{make_request_span, RequestIdExt};
use crate::http::upstream::UpstreamClient;
use crate::observability::metrics;
use crate::routing::{split_segments, PatternRegistry};
use crate::security::AllowList;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub cache: Arc<ResponseCache>,
    pub registry: Arc<PatternRegistry>,
    pub admin_key: Option<Arc<str>>,
}

/// HTTP server for the template proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    cache: Arc<ResponseCache>,
}

impl HttpServer {
    /// Create a server using the configured cache backend and the system clock.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let store = build_store(&config.cache);
        Self::with_store(config, store, Arc::new(SystemClock))
    }

    /// Create a server over an explicit store and clock.
    pub fn with_store(
        config: ProxyConfig,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let registry = Arc::new(PatternRegistry::from_config(&config.routes)?);
        let allow_list = Arc::new(AllowList::compile(&config.routes.allowed_params)?);
        let cache = Arc::new(ResponseCache::new(store, clock, &registry));
        let upstream = UpstreamClient::new(&config.upstream)?;

        for route in registry.routes() {
            tracing::info!(
                route = %route.name(),
                template = %route.template(),
                cache_ttl_secs = route.cache_ttl_secs(),
                "Route registered"
            );
        }
        if !allow_list.is_empty() {
            tracing::info!(rules = allow_list.len(), "Allow-list active");
        }

        let state = AppState {
            pipeline: Arc::new(Pipeline::new(
                registry.clone(),
                allow_list,
                cache.clone(),
                upstream,
            )),
            cache: cache.clone(),
            registry,
            admin_key: config.admin.api_key.as_deref().map(Arc::from),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            cache,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(
                "/invalidate-cache/{route}",
                delete(invalidate_cache).get(proxy_handler),
            )
            .route("/cleanup-cache", post(cleanup_cache).get(proxy_handler))
            .route("/", get(proxy_handler))
            .route("/{*path}", get(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(SetResponseHeaderLayer::overriding(
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        self.cache.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = CacheSweeper::new(self.cache.clone(), &self.config.cache);
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Resolves the path against the routes, then serves from cache or upstream.
async fn proxy_handler(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id();
    let (route, result) = match split_segments(uri.path()) {
        Ok(segments) => (
            state.pipeline.route_label(&segments),
            state.pipeline.handle(&segments).await,
        ),
        Err(e) => ("unknown".to_string(), Err(e)),
    };

    let response = match result {
        Ok(proxied) => {
            tracing::info!(
                request_id = %request_id,
                route = %proxied.route,
                url = %proxied.target_url,
                cache = proxied.cache.label(),
                bytes = proxied.body.len(),
                "Proxied request"
            );
            proxied.into_response()
        }
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!(request_id = %request_id, route = %route, kind = e.kind(), error = %e, "Proxy request failed");
            } else {
                tracing::warn!(request_id = %request_id, route = %route, kind = e.kind(), error = %e, "Proxy request rejected");
            }
            e.into_response()
        }
    };

    metrics::record_request(&route, response.status().as_u16(), start_time);
    response
}
