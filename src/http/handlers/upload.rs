//! `POST /api/v1/images/upload` and the metadata lookup.
//!
//! The multipart `file` field is streamed. Bytes past the size ceiling are
//! counted but not buffered, so an oversized upload is rejected by
//! validation (400) after the body is drained instead of being buffered or
//! cut off mid-stream.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, FromRequest, Multipart},
    http::Request,
    response::Response,
};
use bytes::BytesMut;

use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::http::request::RequestContext;
use crate::http::response::success;
use crate::http::server::AppState;
use crate::upload::UploadFile;

const FILE_FIELD: &str = "file";

pub async fn upload(state: &AppState, ctx: RequestContext, request: Request<Body>) -> GatewayResult<Response> {
    let uploader = ctx
        .principal
        .as_ref()
        .map(|p| p.id.clone())
        .unwrap_or_else(|| ctx.client.clone());
    let max_size = state.uploads.policy().max_size_bytes;

    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        GatewayError::validation(ValidationRule::InvalidBody, e.body_text())
    })?;

    let mut file = None;
    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        if file.is_some() || field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(String::from);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut size: u64 = 0;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            size += chunk.len() as u64;
            if size <= max_size {
                buffer.extend_from_slice(&chunk);
            }
        }

        // Browsers send an empty, unnamed part when no file was chosen.
        if size == 0 && file_name.as_deref().map_or(true, str::is_empty) {
            continue;
        }
        file = Some(UploadFile {
            file_name,
            content_type,
            size,
            bytes: buffer.freeze(),
        });
    }

    let receipt = state.uploads.upload(file, &uploader).await?;
    Ok(success(receipt))
}

pub async fn metadata(state: &AppState, ctx: RequestContext) -> GatewayResult<Response> {
    let key = ctx.params.get("key").ok_or(GatewayError::NotFound("upload"))?;
    let record = state
        .uploads
        .record(key)
        .await?
        .ok_or(GatewayError::NotFound("upload"))?;
    Ok(success(record))
}

fn malformed(e: MultipartError) -> GatewayError {
    GatewayError::validation(ValidationRule::InvalidBody, e.body_text())
}
