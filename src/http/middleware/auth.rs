//! Route resolution and authentication.
//!
//! Resolves the request against the route table (the auth decision depends
//! on the matched route) and stores the [`MatchedRoute`] for the
//! dispatcher. Protected routes need `Authorization: Bearer <secret>`:
//! - missing or malformed header → 401, nothing downstream runs
//! - unknown secret → 403
//! - known secret → the [`Principal`] is attached and the chain continues
//!
//! Unmatched requests pass through untouched and end as 404.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::http::request::{bearer_token, request_id};
use crate::http::routes::MatchedRoute;
use crate::http::server::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let matched = state
        .routes
        .match_request(request.method(), request.uri().path())
        .map(|m| MatchedRoute {
            target: m.route.handler,
            params: m.params,
        });
    let Some(matched) = matched else {
        return next.run(request).await;
    };

    if matched.target.options.auth {
        let Some(token) = bearer_token(request.headers()) else {
            tracing::warn!(request_id = %request_id(request.headers()), path = %request.uri().path(), "Missing bearer credential");
            return GatewayError::Unauthorized.into_response();
        };
        let Some(principal) = state.api_keys().authenticate(token) else {
            tracing::warn!(request_id = %request_id(request.headers()), path = %request.uri().path(), "Unknown bearer credential");
            return GatewayError::Forbidden.into_response();
        };
        tracing::debug!(principal = %principal.id, "Request authenticated");
        request.extensions_mut().insert(principal);
    }

    request.extensions_mut().insert(matched);
    next.run(request).await
}
