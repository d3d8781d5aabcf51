//! Key-value storage behind the response cache.
//!
//! # Responsibilities
//! - Store two slots (metadata, content) per `(namespace, key)`
//! - Enumerate keys of a namespace for invalidation and sweeping
//!
//! # Design Decisions
//! - Backends are interchangeable behind [`CacheStore`]
//! - Filesystem writes go to a unique temp file and are renamed into place,
//!   so a concurrent reader sees either the old file, the new one, or none
//! - Missing files are `Ok(None)`, never an error

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use tokio::fs;

use crate::cache::CacheError;

const METADATA_EXT: &str = ".meta.json";
const CONTENT_EXT: &str = ".body";
const TEMP_EXT: &str = ".tmp";

/// Which half of a cache entry to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Metadata,
    Content,
}

/// Minimal key-value interface the response cache is written against.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str, slot: Slot) -> Result<Option<Bytes>, CacheError>;

    /// Create or overwrite one slot.
    async fn put(&self, namespace: &str, key: &str, slot: Slot, value: Bytes) -> Result<(), CacheError>;

    /// Remove both slots. Returns `true` if anything was removed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError>;

    /// Distinct keys that have at least one slot in `namespace`.
    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<String>, CacheError>;
}

/// One directory per namespace, two files per key.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn slot_path(&self, namespace: &str, key: &str, slot: Slot) -> PathBuf {
        let ext = match slot {
            Slot::Metadata => METADATA_EXT,
            Slot::Content => CONTENT_EXT,
        };
        self.namespace_dir(namespace).join(format!("{}{}", key, ext))
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStore for FsStore {
    async fn get(&self, namespace: &str, key: &str, slot: Slot) -> Result<Option<Bytes>, CacheError> {
        match fs::read(self.slot_path(namespace, key, slot)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, namespace: &str, key: &str, slot: Slot, value: Bytes) -> Result<(), CacheError> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await?;

        let target = self.slot_path(namespace, key, slot);
        let temp = dir.join(format!(".{}.{}{}", key, uuid::Uuid::new_v4(), TEMP_EXT));
        if let Err(e) = fs::write(&temp, &value).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let meta = remove_if_exists(&self.slot_path(namespace, key, Slot::Metadata)).await?;
        let content = remove_if_exists(&self.slot_path(namespace, key, Slot::Content)).await?;
        Ok(meta || content)
    }

    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = match fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name
                .strip_suffix(METADATA_EXT)
                .or_else(|| name.strip_suffix(CONTENT_EXT))
            {
                keys.insert(key.to_string());
            }
        }
        Ok(keys.into_iter().collect())
    }
}

#[derive(Debug, Default, Clone)]
struct MemorySlots {
    metadata: Option<Bytes>,
    content: Option<Bytes>,
}

/// In-process backend; contents do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), MemorySlots>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str, slot: Slot) -> Result<Option<Bytes>, CacheError> {
        let found = self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .and_then(|slots| match slot {
                Slot::Metadata => slots.metadata.clone(),
                Slot::Content => slots.content.clone(),
            });
        Ok(found)
    }

    async fn put(&self, namespace: &str, key: &str, slot: Slot, value: Bytes) -> Result<(), CacheError> {
        let mut slots = self
            .entries
            .entry((namespace.to_string(), key.to_string()))
            .or_default();
        match slot {
            Slot::Metadata => slots.metadata = Some(value),
            Slot::Content => slots.content = Some(value),
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
