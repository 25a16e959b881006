//! Upload orchestration: validate, write the blob, write the metadata.
//!
//! The two writes run on their own task. Once started they finish even if
//! the client disconnects, and the handler does nothing after them. If the
//! metadata write fails the blob is removed again (best effort) and the
//! caller sees one failure.

use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::clock;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::storage::{BlobStore, KvEntry, KvStore, StoreError};
use crate::upload::policy::{generate_key, UploadPolicy};
use crate::upload::types::{UploadFile, UploadReceipt, UploadRecord};

/// KV namespace of upload metadata records.
pub const RECORD_PREFIX: &str = "upload:";

pub struct UploadService {
    blobs: Arc<dyn BlobStore>,
    kv: Arc<dyn KvStore>,
    policy: ArcSwap<UploadPolicy>,
    store_timeout: Duration,
}

impl UploadService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        kv: Arc<dyn KvStore>,
        policy: UploadPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            blobs,
            kv,
            policy: ArcSwap::from_pointee(policy),
            store_timeout,
        }
    }

    pub fn policy(&self) -> Arc<UploadPolicy> {
        self.policy.load_full()
    }

    pub fn update_policy(&self, policy: UploadPolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub async fn upload(&self, file: Option<UploadFile>, uploader: &str) -> GatewayResult<UploadReceipt> {
        let policy = self.policy();
        let file = match policy.validate(file) {
            Ok(file) => file,
            Err(e) => {
                metrics::record_upload("rejected");
                return Err(e);
            }
        };

        let now = clock::now_millis();
        let key = generate_key(now, &file.content_type, file.file_name.as_deref());
        let record = UploadRecord {
            key: key.clone(),
            original_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            uploader: uploader.to_string(),
            uploaded_at: Utc::now(),
        };
        let expires_at = now.saturating_add(policy.metadata_ttl_secs.saturating_mul(1_000));

        let writes = persist(
            self.blobs.clone(),
            self.kv.clone(),
            self.store_timeout,
            file,
            record,
            expires_at,
        );
        let outcome = match tokio::spawn(writes).await {
            Ok(result) => result,
            Err(e) => Err(GatewayError::storage("upload.persist")(StoreError::Unavailable(
                e.to_string(),
            ))),
        };

        match outcome {
            Ok(record) => {
                metrics::record_upload("stored");
                tracing::info!(
                    key = %record.key,
                    size = record.size,
                    content_type = %record.content_type,
                    uploader = %record.uploader,
                    "Upload stored"
                );
                Ok(UploadReceipt {
                    url: policy.public_url(&record.key),
                    filename: record.key,
                    size: record.size,
                    content_type: record.content_type,
                })
            }
            Err(e) => {
                metrics::record_upload("failed");
                Err(e)
            }
        }
    }

    /// The metadata record for `key`, if present and not expired.
    pub async fn record(&self, key: &str) -> GatewayResult<Option<UploadRecord>> {
        let entry = with_timeout(
            self.store_timeout,
            "kv.get",
            self.kv.get(&format!("{RECORD_PREFIX}{key}")),
        )
        .await?;
        match entry {
            Some(entry) if entry.is_live(clock::now_millis()) => {
                let record = serde_json::from_slice(&entry.value)
                    .map_err(|e| GatewayError::storage("upload.decode")(e.into()))?;
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }
}

async fn persist(
    blobs: Arc<dyn BlobStore>,
    kv: Arc<dyn KvStore>,
    store_timeout: Duration,
    file: UploadFile,
    record: UploadRecord,
    expires_at_ms: u64,
) -> GatewayResult<UploadRecord> {
    let metadata = serde_json::to_vec(&record)
        .map_err(|e| GatewayError::storage("upload.encode")(e.into()))?;

    with_timeout(
        store_timeout,
        "blob.put",
        blobs.put(&record.key, file.bytes, &record.content_type),
    )
    .await?;

    let record_key = format!("{RECORD_PREFIX}{}", record.key);
    let put = kv.put(&record_key, KvEntry::new(metadata, Some(expires_at_ms)));
    if let Err(e) = with_timeout(store_timeout, "kv.put", put).await {
        if let Err(cleanup) = with_timeout(store_timeout, "blob.delete", blobs.delete(&record.key)).await {
            tracing::warn!(key = %record.key, error = %cleanup, "Failed to remove orphaned blob");
        }
        return Err(e);
    }

    Ok(record)
}
