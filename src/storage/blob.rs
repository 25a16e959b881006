//! Blob storage for uploaded objects.
//!
//! # Responsibilities
//! - Store raw bytes under a key together with their content type
//! - Serve them back for the CDN path
//!
//! # Design Decisions
//! - Keys are relative, `/`-separated paths; `..`, empty and absolute
//!   segments are refused before touching any backend
//! - The filesystem backend keeps the content type in a sidecar file

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

use crate::storage::{StoreError, StoreResult};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// A stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobObject {
    pub bytes: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<BlobObject>>;

    /// Returns true if an object was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}

/// Reject keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let well_formed = !key.is_empty()
        && !key.starts_with('/')
        && !key.ends_with(CONTENT_TYPE_SUFFIX)
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, BlobObject>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.objects.insert(
            key.to_string(),
            BlobObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<BlobObject>> {
        validate_key(key)?;
        Ok(self.objects.get(key).map(|r| r.value().clone()))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.objects.remove(key).is_some())
    }
}

/// Blob store rooted in a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(CONTENT_TYPE_SUFFIX);
        PathBuf::from(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        tokio::fs::write(Self::sidecar(&path), content_type.as_bytes()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<BlobObject>> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match tokio::fs::read_to_string(Self::sidecar(&path)).await {
            Ok(ct) => ct,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "application/octet-stream".to_string()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(BlobObject {
            bytes: Bytes::from(bytes),
            content_type,
        }))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let _ = tokio::fs::remove_file(Self::sidecar(&path)).await;
        Ok(removed)
    }
}
