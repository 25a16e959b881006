//! End-to-end tests against a running gateway.

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

mod common;

use common::{png_bytes, spawn_gateway, test_config};

fn file_form(bytes: Vec<u8>, name: &str, mime: &str) -> Form {
    Form::new().part(
        "file",
        Part::bytes(bytes).file_name(name.to_string()).mime_str(mime).unwrap(),
    )
}

#[tokio::test]
async fn test_health() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw.client.get(gw.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unregistered_method_returns_404() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw.authed(Method::PATCH, "/api/v1/cache/foo").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = gw.client.get(gw.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_protected_routes_need_a_known_key() {
    let gw = spawn_gateway(test_config()).await;

    let res = gw.client.get(gw.url("/api/v1/cache/foo")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "unauthorized");

    let res = gw
        .client
        .get(gw.url("/api/v1/cache/foo"))
        .bearer_auth("not-a-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cache_round_trip() {
    let gw = spawn_gateway(test_config()).await;

    let res = gw
        .authed(Method::PUT, "/api/v1/cache/menu:truck-7")
        .json(&json!({ "value": { "items": 3 }, "ttl": 60 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["ttl"], 60);

    let res = gw.authed(Method::GET, "/api/v1/cache/menu:truck-7").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["key"], "menu:truck-7");
    assert_eq!(body["data"]["value"]["items"], 3);

    let res = gw.authed(Method::DELETE, "/api/v1/cache/menu:truck-7").send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["deleted"], true);

    let res = gw.authed(Method::GET, "/api/v1/cache/menu:truck-7").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cache_rejects_zero_ttl_and_bad_json() {
    let gw = spawn_gateway(test_config()).await;

    let res = gw
        .authed(Method::PUT, "/api/v1/cache/k")
        .json(&json!({ "value": 1, "ttl": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "invalid_ttl");

    let res = gw
        .authed(Method::PUT, "/api/v1/cache/k")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "invalid_body");
}

#[tokio::test]
async fn test_cache_purge_by_glob() {
    let gw = spawn_gateway(test_config()).await;
    for key in ["uploads:a", "uploads:b", "other:c"] {
        let res = gw
            .authed(Method::PUT, &format!("/api/v1/cache/{key}"))
            .json(&json!({ "value": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = gw
        .authed(Method::POST, "/api/v1/cache/purge")
        .json(&json!({ "pattern": "uploads:*" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["purged"], 2);
    assert_eq!(gw.kv.len(), 1);

    let res = gw
        .authed(Method::POST, "/api/v1/cache/purge")
        .json(&json!({ "pattern": "nothing-here:" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["purged"], 0);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_type_without_writes() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .authed(Method::POST, "/api/v1/images/upload")
        .multipart(file_form(b"<svg/>".to_vec(), "logo.svg", "image/svg+xml"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "unsupported_content_type");
    assert!(gw.blobs.is_empty());
    assert!(gw.kv.is_empty());
}

#[tokio::test]
async fn test_upload_rejects_oversized_file_without_writes() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .authed(Method::POST, "/api/v1/images/upload")
        .multipart(file_form(png_bytes(11 * 1024 * 1024), "huge.png", "image/png"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "file_too_large");
    assert!(gw.blobs.is_empty());
    assert!(gw.kv.is_empty());
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .authed(Method::POST, "/api/v1/images/upload")
        .multipart(Form::new().text("caption", "no file here"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "missing_file");
}

#[tokio::test]
async fn test_upload_then_serve_from_cdn() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .authed(Method::POST, "/api/v1/images/upload")
        .multipart(file_form(png_bytes(2048), "truck.png", "image/png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    let filename = body["data"]["filename"].as_str().unwrap().to_string();
    let url = body["data"]["url"].as_str().unwrap().to_string();
    assert!(filename.starts_with("uploads/"));
    assert!(filename.ends_with(".png"));
    assert_eq!(url, gw.url(&format!("/cdn/images/{filename}")));
    assert_eq!(body["data"]["size"], 2048);
    assert_eq!(body["data"]["type"], "image/png");
    assert_eq!(gw.blobs.len(), 1);

    let res = gw.client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(
        res.headers()["cache-control"],
        "public, max-age=31536000, immutable"
    );
    let etag = res.headers()["etag"].to_str().unwrap().to_string();
    assert_eq!(res.bytes().await.unwrap().len(), 2048);

    let res = gw
        .client
        .get(&url)
        .header("if-none-match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);

    let res = gw
        .client
        .get(format!("{url}?width=300&format=webp"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-image-transform"], "width=300,format=webp");

    let res = gw.client.get(format!("{url}?width=0")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = gw
        .authed(Method::GET, &format!("/api/v1/images/meta/{filename}"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["uploader"], "admin-panel");
    assert_eq!(body["data"]["originalName"], "truck.png");
}

#[tokio::test]
async fn test_cdn_missing_image() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .client
        .get(gw.url("/cdn/images/uploads/0-missing.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_headers_and_rejection() {
    let mut config = test_config();
    config.rate_limit.max_requests = 3;
    let gw = spawn_gateway(config).await;

    let probe = || {
        gw.client
            .get(gw.url("/api/v1/rate-limit-test"))
            .header("cf-connecting-ip", "203.0.113.7")
            .send()
    };

    for expected_remaining in ["2", "1", "0"] {
        let res = probe().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "3");
        assert_eq!(res.headers()["x-ratelimit-remaining"], expected_remaining);
        assert!(res.headers().contains_key("x-ratelimit-reset"));
    }

    let res = probe().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    // A different client has its own window.
    let res = gw
        .client
        .get(gw.url("/api/v1/rate-limit-test"))
        .header("cf-connecting-ip", "203.0.113.8")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reloaded_ceiling_applies_to_next_request() {
    let gw = spawn_gateway(test_config()).await;
    let probe = || {
        gw.client
            .get(gw.url("/api/v1/rate-limit-test"))
            .header("cf-connecting-ip", "198.51.100.4")
            .send()
    };
    assert_eq!(probe().await.unwrap().status(), StatusCode::OK);

    let mut reloaded = test_config();
    reloaded.rate_limit.max_requests = 1;
    gw.config_updates.send(reloaded).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = probe().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-limit"], "1");
}

#[tokio::test]
async fn test_swiss_canton_lookup() {
    let gw = spawn_gateway(test_config()).await;

    let res = gw
        .client
        .get(gw.url("/api/v1/swiss/canton?postalCode=8001"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["postalCode"], "8001");
    assert_eq!(body["canton"], "ZH");
    assert_eq!(body["language"], "de");
    assert_eq!(body["taxRate"], 7.7);

    let res = gw
        .client
        .get(gw.url("/api/v1/swiss/canton"))
        .header("cf-postal-code", "1201")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["canton"], "GE");
    assert_eq!(body["language"], "fr");

    let res = gw
        .client
        .get(gw.url("/api/v1/swiss/canton?postalCode=0000"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["canton"], "CH");

    let res = gw.client.get(gw.url("/api/v1/swiss/canton")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["rule"], "missing_location");
}

#[tokio::test]
async fn test_geo_echo() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .client
        .get(gw.url("/api/v1/geo"))
        .header("cf-ipcountry", "CH")
        .header("cf-ipcity", "Zurich")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["country"], "CH");
    assert_eq!(body["city"], "Zurich");
    assert!(body["postalCode"].is_null());
}

#[tokio::test]
async fn test_cors_preflight_short_circuits() {
    let gw = spawn_gateway(test_config()).await;
    let res = gw
        .client
        .request(Method::OPTIONS, gw.url("/api/v1/images/upload"))
        .header("origin", "https://admin.example.ch")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.headers().contains_key("access-control-allow-methods"));

    // Ordinary responses are annotated too.
    let res = gw.client.get(gw.url("/health")).send().await.unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
}
