//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → api_keys.rs (bearer secret → Principal, used by the auth middleware)
//!     → rate_limit.rs (per-client sliding window, one actor per key)
//!     → headers.rs (hardening headers on every response)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure, including a
//!   rate limit window that could not be persisted
//! - Secrets are kept only as digests

pub mod api_keys;
pub mod headers;
pub mod rate_limit;

pub use api_keys::{ApiKeyRing, Principal};
pub use rate_limit::{ActorSettings, RateLimitDecision, RateLimitPolicy, RateLimiter};
