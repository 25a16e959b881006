//! Upload data types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Name supplied by the client (untrusted).
    pub file_name: Option<String>,
    /// Declared MIME type.
    pub content_type: String,
    /// Declared or counted length in bytes. May exceed `bytes.len()` when
    /// the reader stopped buffering past the size ceiling.
    pub size: u64,
    pub bytes: Bytes,
}

/// Metadata stored alongside an uploaded blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub key: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub uploader: String,
    pub uploaded_at: DateTime<Utc>,
}

/// What the caller gets back after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
    pub url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}
