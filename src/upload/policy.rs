//! Upload validation and naming.
//!
//! # Responsibilities
//! - Enforce the checks in order: file present, type allowed, size within
//!   limit (all before any storage write)
//! - Generate collision resistant object keys
//! - Build public CDN URLs
//!
//! # Design Decisions
//! - Key suffix is 16 random bytes (hex), so collisions within one
//!   millisecond are negligible
//! - The file extension comes from the MIME type; the client's name is only
//!   a fallback, reduced to ASCII alphanumerics

use rand::Rng;

use crate::config::schema::UploadConfig;
use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::upload::types::UploadFile;

pub const KEY_PREFIX: &str = "uploads/";
const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_types: Vec<String>,
    pub max_size_bytes: u64,
    pub metadata_ttl_secs: u64,
    pub public_base_url: String,
}

impl UploadPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            allowed_types: config
                .allowed_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            max_size_bytes: config.max_size_bytes,
            metadata_ttl_secs: config.metadata_ttl_secs,
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Run every check in order, returning the file on success.
    pub fn validate(&self, file: Option<UploadFile>) -> GatewayResult<UploadFile> {
        let file = file.ok_or_else(|| {
            GatewayError::validation(ValidationRule::MissingFile, "no file provided in field 'file'")
        })?;
        self.check_content_type(&file.content_type)?;
        self.check_size(file.size)?;
        Ok(file)
    }

    pub fn check_content_type(&self, content_type: &str) -> GatewayResult<()> {
        let essence = essence(content_type);
        if self.allowed_types.iter().any(|t| *t == essence) {
            Ok(())
        } else {
            Err(GatewayError::validation(
                ValidationRule::UnsupportedContentType,
                format!(
                    "content type '{}' is not allowed (allowed: {})",
                    content_type,
                    self.allowed_types.join(", ")
                ),
            ))
        }
    }

    pub fn check_size(&self, size: u64) -> GatewayResult<()> {
        if size > self.max_size_bytes {
            Err(GatewayError::validation(
                ValidationRule::FileTooLarge,
                format!(
                    "file is {} bytes, maximum is {} bytes",
                    size, self.max_size_bytes
                ),
            ))
        } else {
            Ok(())
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/cdn/images/{}",
            self.public_base_url.trim_end_matches('/'),
            key
        )
    }
}

/// `uploads/{epoch_millis}-{32 hex chars}.{ext}`
pub fn generate_key(now_ms: u64, content_type: &str, file_name: Option<&str>) -> String {
    let random: [u8; 16] = rand::thread_rng().gen();
    let id: String = random.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{KEY_PREFIX}{now_ms}-{id}.{}",
        extension_for(content_type, file_name)
    )
}

pub fn extension_for(content_type: &str, file_name: Option<&str>) -> String {
    let known = match essence(content_type).as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/avif" => Some("avif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(MAX_EXTENSION_LEN)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}

/// MIME type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
