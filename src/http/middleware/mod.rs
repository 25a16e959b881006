//! Middleware chain, outermost first: CORS → logging → auth.
//!
//! Each step is an axum `from_fn_with_state` function and may answer the
//! request itself instead of calling `next`.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::auth_middleware;
pub use cors::cors_middleware;
pub use logging::logging_middleware;
