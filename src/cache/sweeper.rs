//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::cache::ResponseCache;
use crate::config::CacheConfig;

/// Periodically removes expired entries from the response cache.
pub struct CacheSweeper {
    cache: Arc<ResponseCache>,
    initial_delay: Duration,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<ResponseCache>, config: &CacheConfig) -> Self {
        Self {
            cache,
            initial_delay: Duration::from_secs(config.sweep_delay_secs),
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    /// Run until shutdown. The first sweep waits for `initial_delay` so it
    /// does not compete with warm-up traffic.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            initial_delay_secs = self.initial_delay.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Cache sweeper starting"
        );

        tokio::select! {
            _ = time::sleep(self.initial_delay) => {}
            _ = shutdown.recv() => {
                tracing::info!("Cache sweeper received shutdown signal before first sweep");
                return;
            }
        }

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let deleted = self.cache.sweep_expired().await;
                    tracing::info!(deleted, "Cache sweep complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
