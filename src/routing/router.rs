//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route whose method and path both match
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; route tables are small
//! - A method mismatch is an ordinary no-match (404 upstream, never 405)

use axum::http::Method;

use crate::routing::matcher::{PathParams, PathPattern, PatternError};

#[derive(Debug)]
pub struct Route<H> {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: H,
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: PathParams,
}

#[derive(Debug)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. Earlier registrations win on overlap.
    pub fn route(mut self, method: Method, pattern: &str, handler: H) -> Result<Self, PatternError> {
        self.routes.push(Route {
            method,
            pattern: PathPattern::parse(pattern)?,
            handler,
        });
        Ok(self)
    }

    pub fn match_request(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }
}
