//! Endpoint handlers.
//!
//! Handlers are plain async functions taking the shared state, the
//! resolved [`RequestContext`](crate::http::request::RequestContext) and,
//! where they need headers or a body, the request itself. The dispatcher in
//! `server.rs` picks one per [`Endpoint`](crate::http::routes::Endpoint).

pub mod cache;
pub mod cdn;
pub mod geo;
pub mod health;
pub mod rate_limit;
pub mod upload;
