//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (tower-http: trace, request id, timeout, body limit)
//!     → security headers
//!     → middleware/cors.rs    (preflight answered here)
//!     → middleware/logging.rs (one record per request)
//!     → middleware/auth.rs    (route resolution, bearer check)
//!     → server.rs dispatch    (rate limit gate)
//!     → handlers/*            (cache, upload, cdn, geo, health)
//!     → response.rs           ({success, data} envelope)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use routes::{Endpoint, RouteOptions};
pub use server::{AppState, GatewayServer};
