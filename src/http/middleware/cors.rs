//! CORS annotation.
//!
//! Outermost step of the chain. Preflights (`OPTIONS` with
//! `Access-Control-Request-Method`) are answered here with 204 and never
//! reach logging, auth or a handler; every other response is annotated on
//! the way out.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::schema::CorsConfig;
use crate::http::server::AppState;

pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.config();
    let origin = request.headers().get(header::ORIGIN).cloned();

    let preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if preflight {
        let mut response = StatusCode::NO_CONTENT.into_response();
        annotate(response.headers_mut(), &config.cors, origin.as_ref(), true);
        return response;
    }

    let mut response = next.run(request).await;
    annotate(response.headers_mut(), &config.cors, origin.as_ref(), false);
    response
}

fn annotate(headers: &mut HeaderMap, cors: &CorsConfig, origin: Option<&HeaderValue>, preflight: bool) {
    let Some(allowed) = allowed_origin(cors, origin) else {
        return;
    };
    if allowed != "*" {
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);

    let joined = |values: &[String]| HeaderValue::from_str(&values.join(", ")).ok();
    if preflight {
        if let Some(methods) = joined(&cors.allowed_methods) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        if let Some(allowed_headers) = joined(&cors.allowed_headers) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers);
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(cors.max_age_secs));
    } else if !cors.expose_headers.is_empty() {
        if let Some(exposed) = joined(&cors.expose_headers) {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, exposed);
        }
    }
}

/// The `Access-Control-Allow-Origin` value for this request, if any.
fn allowed_origin(cors: &CorsConfig, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
    if cors.allowed_origins.iter().any(|o| o == "*") {
        return Some(HeaderValue::from_static("*"));
    }
    let origin = origin?;
    let text = origin.to_str().ok()?;
    cors.allowed_origins
        .iter()
        .any(|o| o.eq_ignore_ascii_case(text))
        .then(|| origin.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origins: &[&str]) -> CorsConfig {
        CorsConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..CorsConfig::default()
        }
    }

    #[test]
    fn test_wildcard_origin() {
        let mut headers = HeaderMap::new();
        annotate(&mut headers, &cors(&["*"]), None, true);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[test]
    fn test_listed_origin_is_echoed() {
        let origin = HeaderValue::from_static("https://admin.example.ch");
        let mut headers = HeaderMap::new();
        annotate(&mut headers, &cors(&["https://admin.example.ch"]), Some(&origin), false);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://admin.example.ch");
        assert_eq!(headers[header::VARY], "origin");
        assert!(headers.contains_key(header::ACCESS_CONTROL_EXPOSE_HEADERS));
    }

    #[test]
    fn test_unlisted_origin_gets_nothing() {
        let origin = HeaderValue::from_static("https://evil.example");
        let mut headers = HeaderMap::new();
        annotate(&mut headers, &cors(&["https://admin.example.ch"]), Some(&origin), true);
        assert!(headers.is_empty());
    }
}
