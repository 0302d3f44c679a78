//! In-memory Remote Item Service.
//!
//! Backs the reference HTTP server and doubles as a local store of record for tests.

use crate::error::RemoteError;
use crate::models::{ItemId, ParentId, Payload, RemoteItem, UpdateItemRequest};
use crate::remote::RemoteItemService;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

struct StoredItem<P> {
    item: RemoteItem<P>,
    // Creation order, used to break position ties in listings.
    seq: u64,
}

struct MemoryState<P> {
    items: HashMap<ItemId, StoredItem<P>>,
    next_seq: u64,
}

/// Thread-safe item store keyed by server-assigned ids.
pub struct MemoryItemService<P> {
    inner: Mutex<MemoryState<P>>,
}

impl<P> Default for MemoryItemService<P> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                items: HashMap::new(),
                next_seq: 0,
            }),
        }
    }
}

impl<P: Payload> MemoryItemService<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState<P>>, RemoteError> {
        self.inner
            .lock()
            .map_err(|_| RemoteError::Unavailable("item store state is poisoned".to_string()))
    }

    /// Items of `parent_id` ordered by position, ties in creation order.
    pub fn list(&self, parent_id: &ParentId) -> Result<Vec<RemoteItem<P>>, RemoteError> {
        let state = self.state()?;
        let mut stored: Vec<&StoredItem<P>> = state
            .items
            .values()
            .filter(|stored| &stored.item.parent_id == parent_id)
            .collect();
        stored.sort_by_key(|stored| (stored.item.position, stored.seq));
        Ok(stored.into_iter().map(|stored| stored.item.clone()).collect())
    }

    pub fn get(&self, id: &ItemId) -> Result<Option<RemoteItem<P>>, RemoteError> {
        Ok(self.state()?.items.get(id).map(|stored| stored.item.clone()))
    }

    /// Number of items across all collections.
    pub fn len(&self) -> Result<usize, RemoteError> {
        Ok(self.state()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool, RemoteError> {
        Ok(self.len()? == 0)
    }

    /// Create an item, appending to the collection when `position` is `None`.
    pub fn create(
        &self,
        parent_id: &ParentId,
        payload: P,
        position: Option<usize>,
    ) -> Result<RemoteItem<P>, RemoteError> {
        let mut state = self.state()?;
        let position = position.unwrap_or_else(|| {
            state
                .items
                .values()
                .filter(|stored| &stored.item.parent_id == parent_id)
                .count()
        });
        let item = RemoteItem {
            id: ItemId::generate(),
            parent_id: parent_id.clone(),
            position,
            payload,
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.items.insert(
            item.id.clone(),
            StoredItem {
                item: item.clone(),
                seq,
            },
        );
        Ok(item)
    }

    /// Overwrite the supplied fields of an existing item.
    ///
    /// # Errors
    /// [`RemoteError::NotFound`] when `id` is unknown.
    pub fn update(
        &self,
        id: &ItemId,
        req: UpdateItemRequest<P>,
    ) -> Result<RemoteItem<P>, RemoteError> {
        let mut state = self.state()?;
        let stored = state
            .items
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(format!("item '{}'", id)))?;
        if let Some(position) = req.position {
            stored.item.position = position;
        }
        if let Some(payload) = req.payload {
            stored.item.payload = payload;
        }
        Ok(stored.item.clone())
    }

    /// # Errors
    /// [`RemoteError::NotFound`] when `id` is unknown.
    pub fn delete(&self, id: &ItemId) -> Result<(), RemoteError> {
        self.state()?
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("item '{}'", id)))
    }
}

#[async_trait]
impl<P: Payload> RemoteItemService<P> for MemoryItemService<P> {
    async fn list_items(&self, parent_id: &ParentId) -> Result<serde_json::Value, RemoteError> {
        let items = self.list(parent_id)?;
        serde_json::to_value(items).map_err(|err| RemoteError::Malformed(err.to_string()))
    }

    async fn create_item(
        &self,
        parent_id: &ParentId,
        payload: &P,
        position: usize,
    ) -> Result<RemoteItem<P>, RemoteError> {
        self.create(parent_id, payload.clone(), Some(position))
    }

    async fn update_item(
        &self,
        id: &ItemId,
        position: usize,
        payload: &P,
    ) -> Result<(), RemoteError> {
        self.update(
            id,
            UpdateItemRequest {
                position: Some(position),
                payload: Some(payload.clone()),
            },
        )
        .map(|_| ())
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), RemoteError> {
        self.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryPayload;

    #[test]
    fn create_appends_and_list_orders_by_position() {
        let service = MemoryItemService::new();
        let parent = ParentId::new("m1");
        let a = service
            .create(&parent, EntryPayload::titled("A"), None)
            .unwrap();
        let b = service
            .create(&parent, EntryPayload::titled("B"), None)
            .unwrap();
        service
            .create(&ParentId::new("other"), EntryPayload::titled("X"), None)
            .unwrap();
        assert_eq!((a.position, b.position), (0, 1));

        service
            .update(
                &a.id,
                UpdateItemRequest {
                    position: Some(5),
                    payload: None,
                },
            )
            .unwrap();
        let listed: Vec<_> = service
            .list(&parent)
            .unwrap()
            .into_iter()
            .map(|item| item.payload.title)
            .collect();
        assert_eq!(listed, ["B", "A"]);
    }

    #[test]
    fn partial_update_keeps_unspecified_fields() {
        let service = MemoryItemService::new();
        let parent = ParentId::new("m1");
        let item = service
            .create(&parent, EntryPayload::titled("A").with_url("u"), Some(3))
            .unwrap();
        let updated = service
            .update(
                &item.id,
                UpdateItemRequest {
                    position: None,
                    payload: Some(EntryPayload::titled("A2")),
                },
            )
            .unwrap();
        assert_eq!(updated.position, 3);
        assert_eq!(updated.payload.title, "A2");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let service: MemoryItemService<EntryPayload> = MemoryItemService::new();
        let missing = ItemId::new("missing");
        assert!(matches!(
            service.delete(&missing),
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            service.update(
                &missing,
                UpdateItemRequest {
                    position: Some(0),
                    payload: None
                }
            ),
            Err(RemoteError::NotFound(_))
        ));
    }
}
