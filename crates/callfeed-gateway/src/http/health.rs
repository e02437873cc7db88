use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.calls.hub().subscriber_count(),
        "history": state.calls.history_len(),
        "capacity": state.calls.capacity(),
        "last_id": state.calls.last().map(|c| c.id),
        "directory": state.directory.name(),
    }))
}
