//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, probabilities in [0, 1])
//! - Check cross-field consistency (body limit covers upload limit)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system (startup and reload)

use std::collections::HashSet;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{BlobBackend, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.store_ms == 0 {
        errors.push(ValidationError::new("timeouts.store_ms", "must be > 0"));
    }

    let rl = &config.rate_limit;
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }
    if rl.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&rl.cleanup_probability) {
        errors.push(ValidationError::new(
            "rate_limit.cleanup_probability",
            "must be within [0, 1]",
        ));
    }
    if rl.mailbox_capacity == 0 {
        errors.push(ValidationError::new("rate_limit.mailbox_capacity", "must be > 0"));
    }
    if rl.actor_idle_secs == 0 {
        errors.push(ValidationError::new("rate_limit.actor_idle_secs", "must be > 0"));
    }

    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new("cache.default_ttl_secs", "must be > 0"));
    }
    if config.cache.default_ttl_secs > config.cache.max_ttl_secs {
        errors.push(ValidationError::new(
            "cache.default_ttl_secs",
            "must not exceed cache.max_ttl_secs",
        ));
    }

    let upload = &config.upload;
    if upload.allowed_types.is_empty() {
        errors.push(ValidationError::new("upload.allowed_types", "must not be empty"));
    }
    for mime in &upload.allowed_types {
        if !mime.contains('/') {
            errors.push(ValidationError::new(
                "upload.allowed_types",
                format!("'{mime}' is not a MIME type"),
            ));
        }
    }
    if upload.max_size_bytes == 0 {
        errors.push(ValidationError::new("upload.max_size_bytes", "must be > 0"));
    }
    if upload.metadata_ttl_secs == 0 {
        errors.push(ValidationError::new("upload.metadata_ttl_secs", "must be > 0"));
    }
    match Url::parse(&upload.public_base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::new(
            "upload.public_base_url",
            format!("'{}' is not an http(s) URL", upload.public_base_url),
        )),
    }
    if (config.security.max_body_size as u64) < upload.max_size_bytes {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be at least upload.max_size_bytes",
        ));
    }

    let mut ids = HashSet::new();
    for key in &config.auth.api_keys {
        if key.id.is_empty() {
            errors.push(ValidationError::new("auth.api_keys", "key id must not be empty"));
        }
        if key.secret.is_empty() {
            errors.push(ValidationError::new(
                "auth.api_keys",
                format!("secret for '{}' must not be empty", key.id),
            ));
        }
        if !ids.insert(key.id.as_str()) {
            errors.push(ValidationError::new(
                "auth.api_keys",
                format!("duplicate key id '{}'", key.id),
            ));
        }
    }

    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new("cors.allowed_origins", "must not be empty"));
    }

    if config.security.client_ip_header.is_empty() {
        errors.push(ValidationError::new("security.client_ip_header", "must not be empty"));
    }

    if config.storage.blob_backend == BlobBackend::Filesystem && config.storage.blob_root.is_empty()
    {
        errors.push(ValidationError::new(
            "storage.blob_root",
            "required for the filesystem backend",
        ));
    }

    if config.storage.kv_sweep_secs == 0 {
        errors.push(ValidationError::new("storage.kv_sweep_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiKeyConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = 0;
        config.rate_limit.cleanup_probability = 1.5;
        config.upload.allowed_types = vec!["png".to_string()];
        config.upload.public_base_url = "ftp://cdn".to_string();
        config.auth.api_keys = vec![
            ApiKeyConfig {
                id: "a".into(),
                secret: "x".into(),
            },
            ApiKeyConfig {
                id: "a".into(),
                secret: "y".into(),
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"rate_limit.window_secs"));
        assert!(fields.contains(&"rate_limit.cleanup_probability"));
        assert!(fields.contains(&"upload.allowed_types"));
        assert!(fields.contains(&"upload.public_base_url"));
        assert!(fields.contains(&"auth.api_keys"));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_body_limit_must_cover_upload_limit() {
        let mut config = GatewayConfig::default();
        config.security.max_body_size = 1024;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "security.max_body_size");
    }
}
