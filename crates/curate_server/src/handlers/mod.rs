//! HTTP request handlers.

use axum::Json;
use serde_json::{json, Value};

/// Ordered item endpoints.
pub mod item;

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
