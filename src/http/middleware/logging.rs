//! Request logging.
//!
//! One record per request, written after the response is produced:
//! method, path, status, latency, request id and client key. Server errors
//! log at `error`, client errors at `warn`, the rest at `info`.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::http::request::{client_key, peer_addr, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).to_string();
    let client = client_key(
        request.headers(),
        peer_addr(&request),
        &state.config().security,
    );

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(request_id = %request_id, method = %method, path = %path, status = status.as_u16(), latency_ms = latency_ms, client = %client, "Request failed");
    } else if status.is_client_error() {
        tracing::warn!(request_id = %request_id, method = %method, path = %path, status = status.as_u16(), latency_ms = latency_ms, client = %client, "Request rejected");
    } else {
        tracing::info!(request_id = %request_id, method = %method, path = %path, status = status.as_u16(), latency_ms = latency_ms, client = %client, "Request completed");
    }
    metrics::record_request(method.as_str(), status.as_u16(), start);

    response
}
