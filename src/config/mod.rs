//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, apply EDGE_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via ArcSwap to handlers and middleware
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap; the next request observes the new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener address and body limit are fixed at startup; everything
//!   else is picked up on reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    ApiKeyConfig, AuthConfig, BlobBackend, CacheConfig, CorsConfig, GatewayConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, StorageConfig,
    TimeoutConfig, UploadConfig,
};
