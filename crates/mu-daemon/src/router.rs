//! Route table

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::events::events_handler;
use crate::handlers::{ancestors, context, cycles, deps, impact, query, status};
use crate::project::DaemonState;

pub fn create_router(state: Arc<DaemonState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/query", post(query))
        .route("/context", post(context))
        .route("/impact", post(impact))
        .route("/ancestors", post(ancestors))
        .route("/cycles", post(cycles))
        .route("/deps", post(deps))
        .route("/events", get(events_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
