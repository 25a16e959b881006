//! Edge request gateway.
//!
//! Routes requests through a CORS → logging → auth chain, gates them with a
//! per-client sliding-window rate limiter, and serves the cache, upload/CDN
//! and Swiss geo endpoints over explicitly injected stores.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod storage;
pub mod upload;

pub use config::schema::GatewayConfig;
pub use error::{ErrorKind, GatewayError, GatewayResult, ValidationRule};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use storage::Stores;
