//! Per-request orchestration.
//!
//! # Data Flow
//! ```text
//! segments
//!     → select route (single pattern, or /service/<name>/...)
//!     → resolve + validate parameters
//!     → allow-list check
//!     → build target URL
//!     → cache lookup ── HIT ──────────────────────────────┐
//!         └─ MISS → upstream fetch → cache store (if on) ─┴→ ProxyResponse
//! ```
//!
//! # Design Decisions
//! - Validation and authorization complete before any network call
//! - Cache failures are logged and otherwise ignored
//! - Concurrent misses for one URL are not coalesced

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

use crate::cache::ResponseCache;
use crate::error::ProxyError;
use crate::http::upstream::UpstreamClient;
use crate::observability::metrics;
use crate::routing::{build_url, resolve, PatternRegistry, RoutePattern};
use crate::security::AllowList;

/// First segment of a multi-pattern request path.
pub const SERVICE_PREFIX: &str = "service";

/// Parameter that triggers a `Content-Disposition: attachment` header.
pub const FILENAME_PARAM: &str = "filename";

/// How the response relates to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Hit {
        age: Duration,
        expires_in: Duration,
        expires_at_millis: u64,
    },
    Miss {
        ttl: Duration,
        stored_at_millis: u64,
    },
    Disabled,
}

impl CacheStatus {
    /// Value of the `X-Cache` header.
    pub fn label(&self) -> &'static str {
        match self {
            CacheStatus::Hit { .. } => "HIT",
            CacheStatus::Miss { .. } => "MISS",
            CacheStatus::Disabled => "DISABLED",
        }
    }
}

/// A successful proxied response, before header rendering.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub route: String,
    pub target_url: String,
    pub body: Bytes,
    pub content_type: String,
    pub cache: CacheStatus,
    pub filename: Option<String>,
}

/// Wires registry, allow-list, cache and upstream together.
pub struct Pipeline {
    registry: Arc<PatternRegistry>,
    allow_list: Arc<AllowList>,
    cache: Arc<ResponseCache>,
    upstream: UpstreamClient,
}

impl Pipeline {
    pub fn new(
        registry: Arc<PatternRegistry>,
        allow_list: Arc<AllowList>,
        cache: Arc<ResponseCache>,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            registry,
            allow_list,
            cache,
            upstream,
        }
    }

    /// Pick the route for `segments` and return the segments left to resolve.
    pub fn select_route<'a>(
        &self,
        segments: &'a [String],
    ) -> Result<(&RoutePattern, &'a [String]), ProxyError> {
        if let Some(route) = self.registry.single() {
            return Ok((route, segments));
        }

        match segments {
            [prefix, name, rest @ ..] if prefix == SERVICE_PREFIX => self
                .registry
                .get(name)
                .map(|route| (route, rest))
                .ok_or_else(|| ProxyError::UnknownRoute(name.clone())),
            _ => Err(ProxyError::MalformedPath(format!(
                "expected /{}/<name>/...",
                SERVICE_PREFIX
            ))),
        }
    }

    /// Route name for logs and metrics, `unknown` when selection fails.
    pub fn route_label(&self, segments: &[String]) -> String {
        self.select_route(segments)
            .map(|(route, _)| route.name().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub async fn handle(&self, segments: &[String]) -> Result<ProxyResponse, ProxyError> {
        let (route, rest) = self.select_route(segments)?;
        let params = resolve(route, self.registry.mode(), rest)?;

        if !self.allow_list.is_allowed(&params) {
            tracing::warn!(route = %route.name(), params = ?params, "Parameters rejected by allow-list");
            return Err(ProxyError::NotAuthorized);
        }

        let target_url = build_url(route, &params);
        let filename = params.get(FILENAME_PARAM).cloned();
        let ttl = self.cache.ttl(route.name());

        if ttl.is_some() {
            if let Some(hit) = self.cache.lookup(route.name(), &target_url).await {
                metrics::record_cache_lookup(route.name(), "hit");
                tracing::debug!(route = %route.name(), url = %target_url, age_secs = hit.age.as_secs(), "Cache hit");
                return Ok(ProxyResponse {
                    route: route.name().to_string(),
                    cache: CacheStatus::Hit {
                        age: hit.age,
                        expires_in: hit.expires_in(),
                        expires_at_millis: hit.expires_at_millis(),
                    },
                    target_url,
                    body: hit.content,
                    content_type: hit.content_type,
                    filename,
                });
            }
            metrics::record_cache_lookup(route.name(), "miss");
        } else {
            metrics::record_cache_lookup(route.name(), "disabled");
        }

        tracing::debug!(route = %route.name(), url = %target_url, "Fetching upstream");
        let fetched = self.upstream.fetch(&target_url).await?;

        let cache = match ttl {
            Some(ttl) => {
                let stored_at_millis = self.cache.now_millis();
                if let Err(e) = self
                    .cache
                    .store(route.name(), &target_url, fetched.body.clone(), &fetched.content_type)
                    .await
                {
                    tracing::warn!(route = %route.name(), url = %target_url, error = %e, "Failed to store response in cache");
                }
                CacheStatus::Miss {
                    ttl,
                    stored_at_millis,
                }
            }
            None => CacheStatus::Disabled,
        };

        Ok(ProxyResponse {
            route: route.name().to_string(),
            target_url,
            body: fetched.body,
            content_type: fetched.content_type,
            cache,
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryStore};
    use crate::config::{RoutesConfig, UpstreamConfig};
    use crate::routing::{split_segments, ParameterMode};
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn segs(path: &str) -> Vec<String> {
        split_segments(path).unwrap()
    }

    fn pipeline(patterns: Vec<String>, allowed: Vec<BTreeMap<String, String>>) -> Pipeline {
        let routes = RoutesConfig {
            pattern: None,
            patterns,
            parameter_mode: ParameterMode::Named,
            allowed_params: allowed,
        };
        let registry = Arc::new(PatternRegistry::from_config(&routes).unwrap());
        let allow_list = Arc::new(AllowList::compile(&routes.allowed_params).unwrap());
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000)),
            &registry,
        ));
        let upstream = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        Pipeline::new(registry, allow_list, cache, upstream)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/twbs/bootstrap/releases/download/v5.3.8/bootstrap.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("zip", "application/zip"))
            .expect(1)
            .mount(&server)
            .await;

        let p = pipeline(
            vec![format!(
                "github={}/{{owner}}/{{repository}}/releases/download/{{tag}}/{{filename}}|cache:60",
                server.uri()
            )],
            Vec::new(),
        );
        let segments = segs(
            "/service/github/owner/twbs/repository/bootstrap/tag/v5.3.8/filename/bootstrap.zip",
        );

        let first = p.handle(&segments).await.unwrap();
        assert!(matches!(first.cache, CacheStatus::Miss { .. }));
        assert_eq!(first.filename.as_deref(), Some("bootstrap.zip"));
        assert_eq!(first.content_type, "application/zip");

        let second = p.handle(&segments).await.unwrap();
        assert!(matches!(second.cache, CacheStatus::Hit { .. }));
        assert_eq!(second.body, Bytes::from_static(b"zip"));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
            .expect(2)
            .mount(&server)
            .await;

        let p = pipeline(vec![format!("plain={}/{{id}}", server.uri())], Vec::new());
        let segments = segs("/service/plain/id/7");
        for _ in 0..2 {
            let res = p.handle(&segments).await.unwrap();
            assert_eq!(res.cache, CacheStatus::Disabled);
        }
    }

    #[tokio::test]
    async fn test_validation_happens_before_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let allowed = vec![BTreeMap::from([("owner".to_string(), "facebook*".to_string())])];
        let p = pipeline(
            vec![format!("gh={}/{{owner}}/{{tag}}", server.uri())],
            allowed,
        );

        let err = p.handle(&segs("/service/gh/owner/facebook")).await.unwrap_err();
        assert!(matches!(err, ProxyError::MissingParameter(name) if name == "tag"));

        let err = p
            .handle(&segs("/service/gh/owner/myfacebook/tag/v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::NotAuthorized));
    }

    #[tokio::test]
    async fn test_route_selection_errors() {
        let p = pipeline(vec!["a=https://a.example.com/{id}".into()], Vec::new());

        let err = p.handle(&segs("/service/zzz/id/1")).await.unwrap_err();
        assert!(matches!(err, ProxyError::UnknownRoute(name) if name == "zzz"));

        let err = p.handle(&segs("/id/1")).await.unwrap_err();
        assert!(matches!(err, ProxyError::MalformedPath(_)));

        assert_eq!(p.route_label(&segs("/service/a/id/1")), "a");
        assert_eq!(p.route_label(&segs("/nope")), "unknown");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let p = pipeline(vec![format!("r={}/{{id}}|cache:60", server.uri())], Vec::new());
        let segments = segs("/service/r/id/1");
        for _ in 0..2 {
            let err = p.handle(&segments).await.unwrap_err();
            assert_eq!(err.status().as_u16(), 502);
        }
    }

    #[tokio::test]
    async fn test_encoded_separator_cannot_escape_allow_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/facebook/a%20b"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = vec![BTreeMap::from([("owner".to_string(), "facebook*".to_string())])];
        let p = pipeline(vec![format!("gh={}/{{owner}}/{{repo}}", server.uri())], allowed);

        for path in [
            "/service/gh/owner/facebook%2F..%2F..%2Fevil/repo/x",
            "/service/gh/owner/facebook/repo/..",
            "/service/gh/owner/facebook/repo/%FF",
        ] {
            let err = split_segments(path).unwrap_err();
            assert!(matches!(err, ProxyError::MalformedPath(_)), "{path}");
        }

        let res = p.handle(&segs("/service/gh/owner/facebook/repo/a%20b")).await.unwrap();
        assert_eq!(res.target_url, format!("{}/facebook/a%20b", server.uri()));
    }
}
