//! Initial fetch of an ordered collection.
//!
//! A failed or malformed listing never aborts the caller: the store degrades to empty
//! and the failure is reported separately as [`LoadStatus::Failed`].

use crate::error::SequenceError;
use crate::models::{ItemId, ParentId, Payload, RemoteItem, SequenceItem};
use crate::remote::RemoteItemService;
use crate::store::SequenceStore;
use serde_json::Value;
use std::collections::HashSet;

/// Outcome of a collection load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    Failed(SequenceError),
}

impl LoadStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&SequenceError> {
        match self {
            Self::Loaded => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Seeded store plus the status of the fetch that produced it.
#[derive(Debug, Clone)]
pub struct Loaded<P> {
    pub store: SequenceStore<P>,
    pub status: LoadStatus,
}

/// Fetch `parent_id` from `remote` and seed a new store.
pub async fn load_collection<P, R>(remote: &R, parent_id: ParentId) -> Loaded<P>
where
    P: Payload,
    R: RemoteItemService<P> + ?Sized,
{
    let decoded = match remote.list_items(&parent_id).await {
        Ok(raw) => decode_listing(&parent_id, raw),
        Err(err) => Err(SequenceError::LoadError(err.to_string())),
    };

    match decoded {
        Ok(items) => {
            tracing::info!(parent = %parent_id, count = items.len(), "Loaded collection");
            Loaded {
                store: SequenceStore::from_items(parent_id, items),
                status: LoadStatus::Loaded,
            }
        }
        Err(err) => {
            tracing::warn!(parent = %parent_id, "Collection load failed: {}", err);
            Loaded {
                store: SequenceStore::new(parent_id),
                status: LoadStatus::Failed(err),
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Validate a raw listing and return its items in position order.
///
/// Ties keep the order the service returned them in.
///
/// # Errors
/// [`SequenceError::LoadError`] when the body is not a list, an element does not
/// decode, an element belongs to another collection, or an id repeats.
pub fn decode_listing<P: Payload>(
    parent_id: &ParentId,
    raw: Value,
) -> Result<Vec<SequenceItem<P>>, SequenceError> {
    let Value::Array(elements) = raw else {
        return Err(SequenceError::LoadError(format!(
            "expected a list of items, got {}",
            json_kind(&raw)
        )));
    };

    let mut seen: HashSet<ItemId> = HashSet::with_capacity(elements.len());
    let mut items = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let item: RemoteItem<P> = serde_json::from_value(element)
            .map_err(|err| SequenceError::LoadError(format!("item {}: {}", index, err)))?;
        if &item.parent_id != parent_id {
            return Err(SequenceError::LoadError(format!(
                "item {} belongs to collection '{}', expected '{}'",
                item.id, item.parent_id, parent_id
            )));
        }
        if !seen.insert(item.id.clone()) {
            return Err(SequenceError::LoadError(format!(
                "item {} appears more than once",
                item.id
            )));
        }
        items.push(SequenceItem::from(item));
    }
    items.sort_by_key(|item| item.position);
    Ok(items)
}
