//! Success response envelopes.
//!
//! Errors render through `GatewayError`'s `IntoResponse`; everything else
//! that returns the `{success, data}` shape goes through [`success`].

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data,
    })
    .into_response()
}
