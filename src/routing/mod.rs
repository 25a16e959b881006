//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (segment match, parameter capture)
//!     → Return: matched Route + PathParams, or NoMatch
//!
//! Route Compilation (at startup):
//!     (method, pattern, handler)[]
//!     → Compile patterns (literal, :param, *rest)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern, PatternError};
pub use router::{Route, RouteMatch, Router};
