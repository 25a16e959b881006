use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult, ValidationRule};
use crate::geo::{lookup_canton, CantonInfo, GeoInfo};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CantonQuery {
    postal_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CantonResponse {
    pub postal_code: String,
    #[serde(flatten)]
    pub info: CantonInfo,
}

pub fn geo(request: &Request<Body>) -> Response {
    Json(GeoInfo::from_headers(request.headers())).into_response()
}

/// Postal code from `?postalCode=`, else from the edge's geolocation.
pub fn canton(request: &Request<Body>) -> GatewayResult<Response> {
    let from_query = axum::extract::Query::<CantonQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|q| q.0.postal_code);
    let postal_code = from_query
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .or_else(|| GeoInfo::from_headers(request.headers()).postal_code)
        .ok_or_else(|| {
            GatewayError::validation(
                ValidationRule::MissingLocation,
                "location could not be determined: pass ?postalCode=",
            )
        })?;

    let info = lookup_canton(&postal_code);
    Ok(Json(CantonResponse { postal_code, info }).into_response())
}
