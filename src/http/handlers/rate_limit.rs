use axum::response::Response;
use serde::Serialize;

use crate::clock;
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::RequestContext;
use crate::http::response::success;

#[derive(Debug, Serialize)]
struct RateLimitStatus<'a> {
    client: &'a str,
    limit: u32,
    remaining: u32,
    /// Epoch seconds.
    reset: u64,
}

/// Reached only after the dispatcher admitted the request.
pub fn rate_limit_test(ctx: &RequestContext) -> GatewayResult<Response> {
    let decision = ctx
        .rate_limit
        .ok_or(GatewayError::NotFound("rate limit decision"))?;
    Ok(success(RateLimitStatus {
        client: &ctx.client,
        limit: decision.limit,
        remaining: decision.remaining,
        reset: clock::millis_to_secs_ceil(decision.reset_ms),
    }))
}
