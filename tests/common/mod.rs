//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use template_proxy::cache::{ManualClock, MemoryStore, ResponseCache};
use template_proxy::config::{ProxyConfig, RoutesConfig};
use template_proxy::http::HttpServer;
use template_proxy::lifecycle::Shutdown;
use template_proxy::routing::ParameterMode;
use tokio::net::TcpListener;

pub const ADMIN_KEY: &str = "test-admin-key";

/// A proxy running on an ephemeral port with an in-memory cache and a
/// manually driven clock. Dropping it shuts the server down.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub cache: Arc<ResponseCache>,
    pub clock: Arc<ManualClock>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with the given route settings, an admin key and a sweeper that
/// never fires during a test.
pub fn config_with_routes(
    pattern: Option<String>,
    patterns: Vec<String>,
    parameter_mode: ParameterMode,
) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.routes = RoutesConfig {
        pattern,
        patterns,
        parameter_mode,
        allowed_params: Vec::new(),
    };
    config.upstream.timeout_secs = 5;
    config.cache.sweep_delay_secs = 3600;
    config.admin.api_key = Some(ADMIN_KEY.to_string());
    config
}

/// Start the proxy and return once it is accepting connections.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let server = HttpServer::with_store(config, Arc::new(MemoryStore::new()), clock.clone())
        .expect("valid test config");
    let cache = server.cache();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    TestProxy {
        addr,
        cache,
        clock,
        shutdown,
    }
}
