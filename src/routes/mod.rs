//! Router assembly.

mod common;

pub use common::common_routes;

use crate::handlers;
use crate::state::AppState;
use axum::{routing::any, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Prefix under which resource routes are nested.
pub const API_PREFIX: &str = "/api";

/// `/:resource` (list, create) and `/:resource/:id` (get, update, delete). Every other method is 405.
pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", any(handlers::collection))
        .route("/:resource/:id", any(handlers::record))
        .with_state(state)
}

/// Full application: common routes at the root, resources under [`API_PREFIX`], tracing and a
/// request body limit around everything.
pub fn build_app(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest(API_PREFIX, resource_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
