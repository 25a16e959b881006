//! Request inspection helpers.
//!
//! # Responsibilities
//! - Derive the client key used for rate limiting and logs
//! - Extract bearer credentials
//! - Read bounded JSON bodies into typed values
//!
//! # Design Decisions
//! - The client key comes from the trusted edge header first, then the
//!   first `X-Forwarded-For` hop, then the TCP peer
//! - Header values that are not valid IP addresses are ignored, so a
//!   client cannot pick an arbitrary rate limit key through them

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
};
use serde::de::DeserializeOwned;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::SecurityConfig;
use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::routing::PathParams;
use crate::security::{Principal, RateLimitDecision};

pub const X_REQUEST_ID: &str = "x-request-id";

const UNKNOWN_CLIENT: &str = "unknown";

/// Per-request values handed to endpoint handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub params: PathParams,
    pub client: String,
    pub principal: Option<Principal>,
    /// The admitting decision, when the endpoint is rate limited.
    pub rate_limit: Option<RateLimitDecision>,
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// TCP peer recorded by the server, if any.
pub fn peer_addr(request: &Request<Body>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, security: &SecurityConfig) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    from_header(&security.client_ip_header)
        .or_else(|| {
            security
                .trust_forwarded_for
                .then(|| from_header("x-forwarded-for"))
                .flatten()
        })
        .or_else(|| peer.map(|p| p.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// `Authorization: Bearer <token>`. None when absent or malformed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Buffer the body (at most `limit` bytes) and decode it as JSON.
pub async fn read_json<T: DeserializeOwned>(request: Request<Body>, limit: usize) -> GatewayResult<T> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| GatewayError::validation(ValidationRule::InvalidBody, format!("unreadable body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::validation(ValidationRule::InvalidBody, format!("invalid JSON body: {e}")))
}
