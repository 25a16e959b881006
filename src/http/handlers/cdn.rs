//! `GET /cdn/images/*path`.
//!
//! Objects are immutable once written (keys are never reused), so responses
//! carry a one year immutable `Cache-Control` and a strong ETag derived
//! from the content.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::{GatewayError, GatewayResult};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::resilience::with_timeout;
use crate::storage::blob::validate_key;
use crate::upload::ImageTransform;

pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const X_IMAGE_TRANSFORM: &str = "x-image-transform";

pub async fn image(state: &AppState, ctx: RequestContext, request: Request<Body>) -> GatewayResult<Response> {
    let path = ctx.params.get("path").ok_or(GatewayError::NotFound("image"))?;
    if validate_key(path).is_err() {
        return Err(GatewayError::NotFound("image"));
    }
    let transform = ImageTransform::from_query(request.uri().query())?;

    let object = with_timeout(
        state.config().timeouts.store(),
        "blob.get",
        state.stores.blobs.get(path),
    )
    .await?
    .ok_or(GatewayError::NotFound("image"))?;

    let etag = etag_for(&object.bytes);
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_IMMUTABLE));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    if !transform.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&transform.to_string()) {
            headers.insert(HeaderName::from_static(X_IMAGE_TRANSFORM), value);
        }
    }

    if if_none_match(request.headers(), &etag) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    Ok((StatusCode::OK, headers, object.bytes).into_response())
}

fn etag_for(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}

fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|value| {
            value
                .split(',')
                .map(|tag| tag.trim().trim_start_matches("W/"))
                .any(|tag| tag == "*" || tag == etag)
        })
}
