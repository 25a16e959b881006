//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request and store deadlines.
    pub timeouts: TimeoutConfig,

    /// Sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Cache controller TTLs.
    pub cache: CacheConfig,

    /// Upload validation policy and public URL.
    pub upload: UploadConfig,

    /// API keys accepted by the auth middleware.
    pub auth: AuthConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Client identification and hardening.
    pub security: SecurityConfig,

    /// Storage backends.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request in seconds.
    pub request_secs: u64,

    /// Deadline for a single store operation in milliseconds.
    pub store_ms: u64,
}

impl TimeoutConfig {
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            store_ms: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Gate the API routes marked as rate limited. The rate limit test
    /// endpoint is always gated.
    pub enabled: bool,

    /// Window length `W` in seconds.
    pub window_secs: u64,

    /// Admission ceiling `L` per window.
    pub max_requests: u32,

    /// Chance that an evaluation triggers a sweep of expired keys.
    pub cleanup_probability: f64,

    /// Seconds an actor may sit idle before it retires.
    pub actor_idle_secs: u64,

    /// Pending evaluations an actor buffers before senders wait.
    pub mailbox_capacity: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            cleanup_probability: 0.01,
            actor_idle_secs: 120,
            mailbox_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied when a write does not name one.
    pub default_ttl_secs: u64,

    /// Upper bound for any TTL.
    pub max_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3_600,
            max_ttl_secs: 30 * 24 * 3_600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted MIME types.
    pub allowed_types: Vec<String>,

    /// Largest accepted file in bytes.
    pub max_size_bytes: u64,

    /// Lifetime of the metadata record (the blob itself does not expire).
    pub metadata_ttl_secs: u64,

    /// Base for public image URLs (e.g., "https://cdn.example.ch").
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            max_size_bytes: 10 * 1024 * 1024,
            metadata_ttl_secs: 365 * 24 * 3_600,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer secrets and the principal each one authenticates.
    pub api_keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    /// Principal identifier (logged, never the secret).
    pub id: String,

    /// Bearer secret.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any.
    pub allowed_origins: Vec<String>,

    pub allowed_methods: Vec<String>,

    pub allowed_headers: Vec<String>,

    /// Response headers exposed to browsers.
    pub expose_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: ["Content-Type", "Authorization", "X-Request-Id"]
                .map(String::from)
                .to_vec(),
            expose_headers: [
                "X-RateLimit-Limit",
                "X-RateLimit-Remaining",
                "X-RateLimit-Reset",
                "X-Request-Id",
            ]
            .map(String::from)
            .to_vec(),
            max_age_secs: 86_400,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,

    /// Maximum request body size in bytes (must cover the upload limit).
    pub max_body_size: usize,

    /// Header set by the trusted edge proxy carrying the client IP.
    pub client_ip_header: String,

    /// Fall back to the first `X-Forwarded-For` hop.
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 32 * 1024 * 1024, // 32MB
            client_ip_header: "cf-connecting-ip".to_string(),
            trust_forwarded_for: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlobBackend {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub blob_backend: BlobBackend,

    /// Root directory for the filesystem blob backend.
    pub blob_root: String,

    /// KV snapshot loaded at startup and written at shutdown.
    pub kv_snapshot_path: Option<String>,

    /// Rate limit window snapshot, same lifecycle as the KV snapshot.
    pub window_snapshot_path: Option<String>,

    /// Seconds between sweeps that drop expired KV entries.
    pub kv_sweep_secs: u64,
}

impl StorageConfig {
    pub fn kv_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.kv_sweep_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_backend: BlobBackend::Memory,
            blob_root: "./data/blobs".to_string(),
            kv_snapshot_path: None,
            window_snapshot_path: None,
            kv_sweep_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
