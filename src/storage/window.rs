//! Durable per-key cells for rate limit windows.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::storage::StoreResult;

/// Persistence for the timestamp log of each rate limit key.
///
/// Each key is only ever written by the actor that owns it, so
/// implementations need no compare-and-swap.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Stored timestamps (epoch millis, ascending). Empty if unknown.
    async fn load(&self, key: &str) -> StoreResult<Vec<u64>>;

    /// Replace the stored log. An empty log removes the key.
    async fn save(&self, key: &str, timestamps: &[u64]) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Drop every key whose newest timestamp is at or before `cutoff_ms`.
    /// Returns the number of keys removed.
    async fn prune_expired(&self, cutoff_ms: u64) -> StoreResult<usize>;
}

/// In-memory window store, optionally snapshotted to a JSON file so
/// quotas survive a restart.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: DashMap<String, Vec<u64>>,
    persistence_path: Option<PathBuf>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot if one exists at `path`; later saves go there too.
    pub fn load_from_file(path: &Path) -> StoreResult<Self> {
        let store = Self {
            windows: DashMap::new(),
            persistence_path: Some(path.to_path_buf()),
        };
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, Vec<u64>> = serde_json::from_reader(reader)?;
            for (key, mut log) in map.into_iter().filter(|(_, log)| !log.is_empty()) {
                log.sort_unstable();
                store.windows.insert(key, log);
            }
            tracing::info!(windows = store.windows.len(), path = %path.display(), "Loaded rate limit snapshot");
        }
        Ok(store)
    }

    /// Write every stored window to the snapshot path, if configured.
    /// Stale windows are left for the limiter to evict on load.
    pub fn save_to_file(&self) -> StoreResult<()> {
        if let Some(path) = &self.persistence_path {
            let map: HashMap<_, _> = self
                .windows
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &map)?;
            tracing::info!(windows = map.len(), path = %path.display(), "Saved rate limit snapshot");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn load(&self, key: &str) -> StoreResult<Vec<u64>> {
        Ok(self
            .windows
            .get(key)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, key: &str, timestamps: &[u64]) -> StoreResult<()> {
        if timestamps.is_empty() {
            self.windows.remove(key);
        } else {
            self.windows.insert(key.to_string(), timestamps.to_vec());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.windows.remove(key);
        Ok(())
    }

    async fn prune_expired(&self, cutoff_ms: u64) -> StoreResult<usize> {
        let before = self.windows.len();
        self.windows
            .retain(|_, log| log.last().is_some_and(|newest| *newest > cutoff_ms));
        Ok(before - self.windows.len())
    }
}
