//! Startup helpers: store construction, background KV sweep and config
//! hot reload.
//!
//! # Design Decisions
//! - Stores are built once here and handed to the server explicitly
//! - Fail fast: an unreadable snapshot aborts startup rather than
//!   silently starting empty
//! - Expired KV entries are dropped on a fixed interval so keys that are
//!   never read again do not accumulate

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock;
use crate::config::schema::{BlobBackend, GatewayConfig, StorageConfig};
use crate::config::watcher::ConfigWatcher;
use crate::storage::{
    BlobStore, FsBlobStore, MemoryBlobStore, MemoryKvStore, MemoryWindowStore, StoreResult, Stores,
};

/// Stores plus the concrete handles needed to sweep and snapshot them.
pub struct StoreHandles {
    pub stores: Stores,
    pub kv: Arc<MemoryKvStore>,
    pub windows: Arc<MemoryWindowStore>,
}

impl StoreHandles {
    /// Write the KV and rate limit snapshots, whichever are configured.
    /// Both are attempted; the first failure is returned.
    pub fn persist(&self) -> StoreResult<()> {
        let kv = self.kv.save_to_file();
        let windows = self.windows.save_to_file();
        kv.and(windows)
    }
}

pub fn build_stores(config: &StorageConfig) -> StoreResult<StoreHandles> {
    let kv = match &config.kv_snapshot_path {
        Some(path) => Arc::new(MemoryKvStore::load_from_file(Path::new(path))?),
        None => Arc::new(MemoryKvStore::new(None)),
    };
    let windows = match &config.window_snapshot_path {
        Some(path) => Arc::new(MemoryWindowStore::load_from_file(Path::new(path))?),
        None => Arc::new(MemoryWindowStore::new()),
    };

    let blobs: Arc<dyn BlobStore> = match config.blob_backend {
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
        BlobBackend::Filesystem => {
            std::fs::create_dir_all(&config.blob_root)?;
            Arc::new(FsBlobStore::new(PathBuf::from(&config.blob_root)))
        }
    };
    tracing::info!(
        blob_backend = ?config.blob_backend,
        kv_snapshot = config.kv_snapshot_path.as_deref().unwrap_or("none"),
        window_snapshot = config.window_snapshot_path.as_deref().unwrap_or("none"),
        "Stores initialised"
    );

    Ok(StoreHandles {
        stores: Stores {
            kv: kv.clone(),
            blobs,
            windows: windows.clone(),
        },
        kv,
        windows,
    })
}

/// Drop expired KV entries every `every` until `shutdown` fires.
pub fn spawn_kv_sweeper(
    kv: Arc<MemoryKvStore>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = kv.evict_expired(clock::now_millis());
                    if removed > 0 {
                        tracing::debug!(removed = removed, remaining = kv.len(), "Evicted expired KV entries");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("KV sweeper stopped");
    })
}

/// Start watching `path`. Without a file there is nothing to watch and the
/// returned receiver is already closed.
pub fn watch_config(
    path: Option<&Path>,
) -> (Option<RecommendedWatcher>, mpsc::UnboundedReceiver<GatewayConfig>) {
    let Some(path) = path else {
        let (_tx, rx) = mpsc::unbounded_channel();
        return (None, rx);
    };

    let (watcher, rx) = ConfigWatcher::new(path);
    match watcher.run() {
        Ok(handle) => (Some(handle), rx),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Config hot reload disabled");
            (None, rx)
        }
    }
}
