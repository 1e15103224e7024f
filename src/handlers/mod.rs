// src/handlers/mod.rs
pub mod event_handler;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events/firestore", post(event_handler::firestore_event))
        .route("/events/ride-request", post(event_handler::ride_request_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
