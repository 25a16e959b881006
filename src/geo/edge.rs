//! Geolocation observed by the edge proxy.

use axum::http::HeaderMap;
use serde::Serialize;

pub const POSTAL_CODE_HEADER: &str = "cf-postal-code";

/// Location fields as forwarded by the edge. Absent headers stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub timezone: Option<String>,
    pub ray_id: Option<String>,
}

impl GeoInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        Self {
            country: get("cf-ipcountry"),
            region: get("cf-region"),
            region_code: get("cf-region-code"),
            city: get("cf-ipcity"),
            postal_code: get(POSTAL_CODE_HEADER),
            latitude: get("cf-iplatitude"),
            longitude: get("cf-iplongitude"),
            timezone: get("cf-timezone"),
            ray_id: get("cf-ray"),
        }
    }
}
