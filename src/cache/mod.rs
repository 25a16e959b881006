//! Cache subsystem.
//!
//! # Data Flow
//! ```text
//! /api/v1/cache/* handlers
//!     → controller.rs (key rules, TTL defaults, read-time expiry)
//!     → pattern.rs    (prefix / glob purge matching)
//!     → storage::kv   (namespaced `cache:` entries)
//! ```
//!
//! # Design Decisions
//! - Concurrent writes to one key are last-write-wins; no merging
//! - Purge counts only entries that were still live

pub mod controller;
pub mod pattern;

pub use controller::{CacheController, CacheSettings};
pub use pattern::PurgePattern;
