//! `/api/v1/cache/*` endpoints.
//!
//! Values are arbitrary JSON. They are stored as their serialized bytes and
//! decoded again on the way out.

use axum::{body::Body, http::Request, response::Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::http::request::{read_json, RequestContext};
use crate::http::response::success;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PutBody {
    pub value: Value,
    pub ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeBody {
    pub pattern: String,
}

#[derive(Debug, Serialize)]
struct CacheValue<'a> {
    key: &'a str,
    value: Value,
}

fn key(ctx: &RequestContext) -> GatewayResult<&str> {
    ctx.params
        .get("key")
        .ok_or_else(|| GatewayError::validation(ValidationRule::InvalidKey, "missing cache key"))
}

pub async fn get(state: &AppState, ctx: RequestContext) -> GatewayResult<Response> {
    let key = key(&ctx)?;
    let bytes = state.cache.get(key).await?.ok_or(GatewayError::NotFound("cache entry"))?;
    // Entries written by other tools may not be JSON; hand those back as text.
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Ok(success(CacheValue { key, value }))
}

pub async fn put(state: &AppState, ctx: RequestContext, request: Request<Body>) -> GatewayResult<Response> {
    let key = key(&ctx)?;
    let body: PutBody = read_json(request, state.config().security.max_body_size).await?;
    let encoded = serde_json::to_vec(&body.value)
        .map_err(|e| GatewayError::validation(ValidationRule::InvalidBody, e.to_string()))?;
    let ttl = state.cache.set(key, Bytes::from(encoded), body.ttl).await?;
    Ok(success(serde_json::json!({ "key": key, "ttl": ttl })))
}

pub async fn delete(state: &AppState, ctx: RequestContext) -> GatewayResult<Response> {
    let key = key(&ctx)?;
    let deleted = state.cache.delete(key).await?;
    Ok(success(serde_json::json!({ "key": key, "deleted": deleted })))
}

pub async fn purge(state: &AppState, request: Request<Body>) -> GatewayResult<Response> {
    let body: PurgeBody = read_json(request, state.config().security.max_body_size).await?;
    let purged = state.cache.purge(&body.pattern).await?;
    Ok(success(serde_json::json!({ "pattern": body.pattern, "purged": purged })))
}
