//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Build the shared [`AppState`] from a config and explicit store handles
//! - Wire the tower-http stack and the CORS → logging → auth chain
//! - Dispatch resolved requests to endpoint handlers, gating rate limited
//!   endpoints first
//! - Apply hot-reloaded configuration
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - A single catch-all axum route feeds the gateway's own router, so a
//!   method mismatch is a 404 like any other unmatched request
//! - Multipart uploads bypass axum's default body limit; the configured
//!   `security.max_body_size` ceiling applies instead
//! - The body limit layer is built once, so a reload that would raise
//!   `upload.max_size_bytes` above it is refused as a whole

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, Request},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{CacheController, CacheSettings};
use crate::clock;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::http::handlers;
use crate::http::middleware::{auth_middleware, cors_middleware, logging_middleware};
use crate::http::request::{client_key, peer_addr, RequestContext, X_REQUEST_ID};
use crate::http::routes::{gateway_routes, Endpoint, GatewayRouter, MatchedRoute};
use crate::routing::PatternError;
use crate::security::headers::security_headers_middleware;
use crate::security::{ActorSettings, ApiKeyRing, Principal, RateLimitPolicy, RateLimiter};
use crate::storage::Stores;
use crate::upload::{UploadPolicy, UploadService};

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ArcSwap<GatewayConfig>>,
    api_keys: Arc<ArcSwap<ApiKeyRing>>,
    pub routes: Arc<GatewayRouter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<CacheController>,
    pub uploads: Arc<UploadService>,
    pub stores: Stores,
    /// `security.max_body_size` at startup; the limit layer never changes.
    body_limit: usize,
}

impl AppState {
    pub fn new(config: GatewayConfig, stores: Stores) -> Result<Self, PatternError> {
        let store_timeout = config.timeouts.store();
        let rate_limiter = RateLimiter::new(
            stores.windows.clone(),
            RateLimitPolicy::from_config(&config.rate_limit),
            ActorSettings::from_config(&config.rate_limit, store_timeout),
        );
        let cache = CacheController::new(
            stores.kv.clone(),
            CacheSettings::from_config(&config.cache),
            store_timeout,
        );
        let uploads = UploadService::new(
            stores.blobs.clone(),
            stores.kv.clone(),
            UploadPolicy::from_config(&config.upload),
            store_timeout,
        );

        Ok(Self {
            body_limit: config.security.max_body_size,
            api_keys: Arc::new(ArcSwap::from_pointee(ApiKeyRing::from_config(&config.auth))),
            config: Arc::new(ArcSwap::from_pointee(config)),
            routes: Arc::new(gateway_routes()?),
            rate_limiter: Arc::new(rate_limiter),
            cache: Arc::new(cache),
            uploads: Arc::new(uploads),
            stores,
        })
    }

    /// The configuration current at the time of the call.
    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    pub fn api_keys(&self) -> Arc<ApiKeyRing> {
        self.api_keys.load_full()
    }

    /// Swap in a reloaded configuration. Listener address, timeouts, body
    /// limit and storage backends keep their startup values. Returns false,
    /// leaving the running configuration untouched, if the reload allows
    /// uploads the running body limit would cut off.
    pub fn apply_config(&self, mut config: GatewayConfig) -> bool {
        if config.upload.max_size_bytes > self.body_limit as u64 {
            tracing::error!(
                max_upload_bytes = config.upload.max_size_bytes,
                body_limit = self.body_limit,
                "Rejected config reload: upload limit exceeds the body limit fixed at startup"
            );
            return false;
        }
        if config.security.max_body_size != self.body_limit {
            tracing::warn!(
                requested = config.security.max_body_size,
                body_limit = self.body_limit,
                "security.max_body_size only changes on restart"
            );
            config.security.max_body_size = self.body_limit;
        }

        self.rate_limiter
            .set_policy(RateLimitPolicy::from_config(&config.rate_limit));
        self.cache
            .update_settings(CacheSettings::from_config(&config.cache));
        self.uploads
            .update_policy(UploadPolicy::from_config(&config.upload));
        self.api_keys
            .store(Arc::new(ApiKeyRing::from_config(&config.auth)));
        tracing::info!(
            api_keys = config.auth.api_keys.len(),
            rate_limit_max = config.rate_limit.max_requests,
            rate_limit_window_secs = config.rate_limit.window_secs,
            "Configuration applied"
        );
        self.config.store(Arc::new(config));
        true
    }
}

/// HTTP server for the edge gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, stores: Stores) -> Result<Self, PatternError> {
        let state = AppState::new(config, stores)?;
        let router = Self::build_router(&state);
        Ok(Self { router, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let config = state.config();
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            // Innermost first: auth runs last, CORS first.
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .layer(from_fn_with_state(state.clone(), logging_middleware))
            .layer(from_fn_with_state(state.clone(), cors_middleware))
            .layer(from_fn_with_state(state.clone(), security_headers_middleware))
            .with_state(state.clone())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until `shutdown` fires, applying every config
    /// received on `config_updates` in the meantime.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => {
                            state.apply_config(config);
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: rate limit gate, then the endpoint's handler.
async fn dispatch(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let Some(matched) = request.extensions_mut().remove::<MatchedRoute>() else {
        return GatewayError::NotFound("route").into_response();
    };

    let config = state.config();
    let client = client_key(request.headers(), peer_addr(&request), &config.security);

    let rate_limit = if matched
        .target
        .options
        .rate_limit
        .applies(config.rate_limit.enabled)
    {
        match state.rate_limiter.evaluate(&client, clock::now_millis()).await {
            Ok(decision) if decision.admitted => Some(decision),
            Ok(decision) => {
                tracing::warn!(client = %client, reset_ms = decision.reset_ms, "Rate limit exceeded");
                return GatewayError::RateLimited(decision).into_response();
            }
            Err(e) => return e.into_response(),
        }
    } else {
        None
    };

    let ctx = RequestContext {
        params: matched.params,
        client,
        principal: request.extensions().get::<Principal>().cloned(),
        rate_limit,
    };

    let mut response = route(&state, matched.target.endpoint, ctx, request)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    if let Some(decision) = rate_limit {
        decision.apply_headers(response.headers_mut());
    }
    response
}

async fn route(
    state: &AppState,
    endpoint: Endpoint,
    ctx: RequestContext,
    request: Request<Body>,
) -> GatewayResult<Response> {
    match endpoint {
        Endpoint::Health => Ok(handlers::health::health()),
        Endpoint::CdnImage => handlers::cdn::image(state, ctx, request).await,
        Endpoint::ImageUpload => handlers::upload::upload(state, ctx, request).await,
        Endpoint::ImageMeta => handlers::upload::metadata(state, ctx).await,
        Endpoint::CachePurge => handlers::cache::purge(state, request).await,
        Endpoint::CacheGet => handlers::cache::get(state, ctx).await,
        Endpoint::CachePut => handlers::cache::put(state, ctx, request).await,
        Endpoint::CacheDelete => handlers::cache::delete(state, ctx).await,
        Endpoint::RateLimitTest => handlers::rate_limit::rate_limit_test(&ctx),
        Endpoint::Geo => Ok(handlers::geo::geo(&request)),
        Endpoint::SwissCanton => handlers::geo::canton(&request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiKeyConfig;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.api_keys = vec![ApiKeyConfig {
            id: "admin-panel".into(),
            secret: "admin-secret".into(),
        }];
        config
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    async fn send(server: &GatewayServer, request: Request<Body>) -> Response {
        server.router.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_unregistered_method_is_404() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();
        let response = send(
            &server,
            request(Method::PATCH, "/api/v1/cache/foo")
                .header(header::AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auth_short_circuits() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();

        let missing = send(
            &server,
            request(Method::GET, "/api/v1/cache/foo").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = send(
            &server,
            request(Method::GET, "/api/v1/cache/foo")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        // Authenticated miss reaches the handler.
        let miss = send(
            &server,
            request(Method::GET, "/api/v1/cache/foo")
                .header(header::AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preflight_answered_by_cors() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();
        let response = send(
            &server,
            request(Method::OPTIONS, "/api/v1/images/upload")
                .header(header::ORIGIN, "https://admin.example.ch")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_health_carries_request_id_and_hardening() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();
        let response = send(
            &server,
            request(Method::GET, "/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_reload_replaces_api_keys() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();
        let mut reloaded = config();
        reloaded.auth.api_keys[0].secret = "rotated-secret".into();
        assert!(server.state().apply_config(reloaded));

        let old = send(
            &server,
            request(Method::GET, "/api/v1/cache/foo")
                .header(header::AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(old.status(), StatusCode::FORBIDDEN);
        assert!(server.state().api_keys().authenticate("rotated-secret").is_some());
    }

    #[tokio::test]
    async fn test_reload_cannot_outgrow_startup_body_limit() {
        let server = GatewayServer::new(config(), Stores::in_memory()).unwrap();
        let startup_limit = server.state().config().security.max_body_size;
        let startup_upload = server.state().uploads.policy().max_size_bytes;

        let mut reloaded = config();
        reloaded.security.max_body_size = startup_limit * 4;
        reloaded.upload.max_size_bytes = startup_limit as u64 * 2;
        reloaded.rate_limit.max_requests = 1;
        assert!(!server.state().apply_config(reloaded));

        let current = server.state().config();
        assert_eq!(current.security.max_body_size, startup_limit);
        assert_ne!(current.rate_limit.max_requests, 1);
        assert_eq!(server.state().uploads.policy().max_size_bytes, startup_upload);

        // A reload within the running limit applies, but the body limit
        // itself stays at its startup value.
        let mut within = config();
        within.security.max_body_size = startup_limit * 4;
        within.upload.max_size_bytes = startup_upload / 2;
        assert!(server.state().apply_config(within));
        assert_eq!(server.state().config().security.max_body_size, startup_limit);
        assert_eq!(server.state().uploads.policy().max_size_bytes, startup_upload / 2);
    }
}
