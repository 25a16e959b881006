//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! handlers / rate limiter
//!     → resilience::timeouts (deadline on every call)
//!     → kv.rs     (cache entries, upload metadata)
//!     → blob.rs   (uploaded image bytes)
//!     → window.rs (per-key rate limit windows)
//! ```
//!
//! # Design Decisions
//! - Backends sit behind async traits; handles are built once at startup
//!   and passed in explicitly (no lazily initialised globals)
//! - Stores never interpret expiry; TTL semantics belong to the caller
//! - No read-after-write guarantee is assumed across replicas of an
//!   eventually consistent backend

pub mod blob;
pub mod kv;
pub mod window;

use std::sync::Arc;
use thiserror::Error;

pub use blob::{BlobObject, BlobStore, FsBlobStore, MemoryBlobStore};
pub use kv::{KvEntry, KvStore, MemoryKvStore};
pub use window::{MemoryWindowStore, WindowStore};

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Store handles shared by every handler.
#[derive(Clone)]
pub struct Stores {
    pub kv: Arc<dyn KvStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub windows: Arc<dyn WindowStore>,
}

impl Stores {
    /// Purely in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(MemoryKvStore::new(None)),
            blobs: Arc::new(MemoryBlobStore::new()),
            windows: Arc::new(MemoryWindowStore::new()),
        }
    }
}
