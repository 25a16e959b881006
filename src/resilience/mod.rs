//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store call (kv / blob / window)
//!     → timeouts.rs (enforce store deadline)
//!     → StoreError  → GatewayError::Storage
//!     → elapsed     → GatewayError::Timeout
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call has a deadline
//! - A timed-out write is a failure: the rate limiter fails closed,
//!   cache and upload answer with an error response

pub mod timeouts;

pub use timeouts::with_timeout;
