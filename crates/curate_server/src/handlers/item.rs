//! Item HTTP handlers.
//!
//! Payloads are stored as opaque JSON; only identity, parent and position are interpreted.

use crate::{error::AppError, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use curate_core::models::{CreateItemRequest, UpdateItemRequest};
use curate_core::{ItemId, ParentId, RemoteItem};
use serde_json::{json, Value};

fn require_non_blank(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// List the items of a collection in position order.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn list_items(
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
) -> Result<Json<Vec<RemoteItem<Value>>>, AppError> {
    require_non_blank(&parent_id, "parent id")?;
    let items = state.items.list(&ParentId::new(parent_id))?;
    Ok(Json(items))
}

/// Create an item; a request without a position appends to the collection.
///
/// # Errors
/// Returns an error if validation or persistence fails.
pub async fn create_item(
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
    Json(req): Json<CreateItemRequest<Value>>,
) -> Result<Json<RemoteItem<Value>>, AppError> {
    require_non_blank(&parent_id, "parent id")?;
    let item = state
        .items
        .create(&ParentId::new(parent_id), req.payload, req.position)?;
    tracing::debug!(
        item = %item.id,
        parent = %item.parent_id,
        position = item.position,
        "Created item"
    );
    Ok(Json(item))
}

/// Overwrite the supplied fields of an item.
///
/// Position collisions with sibling items are accepted; clients persist reorders one
/// item at a time.
///
/// # Errors
/// Returns 404 for unknown ids and 400 when the body supplies no field.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest<Value>>,
) -> Result<Json<RemoteItem<Value>>, AppError> {
    if req.position.is_none() && req.payload.is_none() {
        return Err(AppError::BadRequest(
            "update must set position or payload".to_string(),
        ));
    }
    let item = state.items.update(&ItemId::new(id), req)?;
    tracing::debug!(item = %item.id, position = item.position, "Updated item");
    Ok(Json(item))
}

/// Delete an item.
///
/// # Errors
/// Returns 404 for unknown ids.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = ItemId::new(id);
    state.items.delete(&id)?;
    tracing::debug!(item = %id, "Deleted item");
    Ok(Json(json!({ "success": true })))
}
