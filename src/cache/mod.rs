//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline:
//!     built URL → response.rs lookup → HIT (serve) / MISS (fetch)
//!     upstream 2xx → response.rs store
//!
//! Background:
//!     sweeper.rs timer → response.rs sweep_expired
//!
//! Management API:
//!     invalidate-cache → response.rs invalidate_route
//!
//! All of the above → store.rs (CacheStore: filesystem or memory)
//! ```
//!
//! # Design Decisions
//! - One namespace per route, one key per target URL digest
//! - No locking: concurrent misses may both write, last write wins
//! - Failures degrade to "miss" / "not persisted", never to a failed request

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod response;
pub mod store;
pub mod sweeper;

pub use response::{cache_key, expires_at_millis, CachedResponse, Clock, ManualClock, ResponseCache, SystemClock};
pub use store::{CacheStore, FsStore, MemoryStore, Slot};
pub use sweeper::CacheSweeper;

use crate::config::CacheConfig;

/// Cache I/O failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache metadata error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Filesystem,
    Memory,
}

/// Build the configured store.
pub fn build_store(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config.backend {
        CacheBackend::Filesystem => Arc::new(FsStore::new(&config.directory)),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    }
}
