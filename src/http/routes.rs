//! The gateway's route table.
//!
//! # Design Decisions
//! - Every endpoint is registered here, with its auth and rate limit
//!   options, so the whole HTTP surface can be read in one place
//! - Registration order is match order

use axum::http::Method;

use crate::routing::{PathParams, PatternError, Router};

/// Every endpoint the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    CdnImage,
    ImageUpload,
    ImageMeta,
    CachePurge,
    CacheGet,
    CachePut,
    CacheDelete,
    RateLimitTest,
    Geo,
    SwissCanton,
}

/// When the rate limiter gates an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    Never,
    /// Only while `rate_limit.enabled` is set.
    WhenEnabled,
    Always,
}

impl RateLimitMode {
    pub fn applies(self, enabled: bool) -> bool {
        match self {
            Self::Never => false,
            Self::WhenEnabled => enabled,
            Self::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOptions {
    pub auth: bool,
    pub rate_limit: RateLimitMode,
}

impl RouteOptions {
    const PUBLIC: Self = Self {
        auth: false,
        rate_limit: RateLimitMode::Never,
    };
    const PROTECTED: Self = Self {
        auth: true,
        rate_limit: RateLimitMode::WhenEnabled,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTarget {
    pub endpoint: Endpoint,
    pub options: RouteOptions,
}

pub type GatewayRouter = Router<RouteTarget>;

/// Attached to the request once its route is resolved.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub target: RouteTarget,
    pub params: PathParams,
}

pub fn gateway_routes() -> Result<GatewayRouter, PatternError> {
    use Endpoint::*;

    let table: [(Method, &str, Endpoint, RouteOptions); 11] = [
        (Method::GET, "/health", Health, RouteOptions::PUBLIC),
        (Method::GET, "/cdn/images/*path", CdnImage, RouteOptions::PUBLIC),
        (Method::POST, "/api/v1/images/upload", ImageUpload, RouteOptions::PROTECTED),
        (
            Method::GET,
            "/api/v1/images/meta/*key",
            ImageMeta,
            RouteOptions {
                auth: true,
                rate_limit: RateLimitMode::Never,
            },
        ),
        (Method::POST, "/api/v1/cache/purge", CachePurge, RouteOptions::PROTECTED),
        (Method::GET, "/api/v1/cache/:key", CacheGet, RouteOptions::PROTECTED),
        (Method::PUT, "/api/v1/cache/:key", CachePut, RouteOptions::PROTECTED),
        (Method::DELETE, "/api/v1/cache/:key", CacheDelete, RouteOptions::PROTECTED),
        (
            Method::GET,
            "/api/v1/rate-limit-test",
            RateLimitTest,
            RouteOptions {
                auth: false,
                rate_limit: RateLimitMode::Always,
            },
        ),
        (Method::GET, "/api/v1/geo", Geo, RouteOptions::PUBLIC),
        (Method::GET, "/api/v1/swiss/canton", SwissCanton, RouteOptions::PUBLIC),
    ];

    table
        .into_iter()
        .try_fold(Router::new(), |router, (method, pattern, endpoint, options)| {
            router.route(method, pattern, RouteTarget { endpoint, options })
        })
}
