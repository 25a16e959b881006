//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - One structured record per request, emitted by the logging middleware
//! - Request ID (`x-request-id`) is attached to every request record
//! - Metrics are cheap (atomic increments) and never block a response

pub mod logging;
pub mod metrics;
