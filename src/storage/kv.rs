//! Key-value store with per-entry expiry metadata.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::clock;
use crate::storage::StoreResult;

/// A stored value and the instant (epoch millis) it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub value: Bytes,
    pub expires_at_ms: Option<u64>,
}

impl KvEntry {
    pub fn new(value: impl Into<Bytes>, expires_at_ms: Option<u64>) -> Self {
        Self {
            value: value.into(),
            expires_at_ms,
        }
    }

    /// An entry is live strictly before its expiry instant.
    pub fn is_live(&self, now_ms: u64) -> bool {
        self.expires_at_ms.map_or(true, |at| now_ms < at)
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw lookup. May return entries past their expiry if the backend has
    /// not evicted them yet.
    async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>>;

    /// Insert or overwrite (last write wins).
    async fn put(&self, key: &str, entry: KvEntry) -> StoreResult<()>;

    /// Returns true if a value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// In-memory KV store, optionally snapshotted to a JSON file.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, KvEntry>,
    persistence_path: Option<PathBuf>,
}

impl MemoryKvStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            entries: DashMap::new(),
            persistence_path,
        }
    }

    /// Load a snapshot if one exists at `path`.
    pub fn load_from_file(path: &Path) -> StoreResult<Self> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, KvEntry> = serde_json::from_reader(reader)?;
            let now = clock::now_millis();
            for (key, entry) in map.into_iter().filter(|(_, e)| e.is_live(now)) {
                store.entries.insert(key, entry);
            }
            tracing::info!(entries = store.entries.len(), path = %path.display(), "Loaded KV snapshot");
        }
        Ok(store)
    }

    /// Write live entries to the snapshot path, if configured.
    pub fn save_to_file(&self) -> StoreResult<()> {
        if let Some(path) = &self.persistence_path {
            let now = clock::now_millis();
            let map: HashMap<_, _> = self
                .entries
                .iter()
                .filter(|r| r.value().is_live(now))
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &map)?;
            tracing::info!(entries = map.len(), path = %path.display(), "Saved KV snapshot");
        }
        Ok(())
    }

    /// Physically drop expired entries.
    pub fn evict_expired(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now_ms));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>> {
        Ok(self.entries.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &str, entry: KvEntry) -> StoreResult<()> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect())
    }
}
