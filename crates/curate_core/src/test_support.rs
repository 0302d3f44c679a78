//! Shared test-only helpers for curate_core.

use crate::error::RemoteError;
use crate::memory::MemoryItemService;
use crate::models::{EntryPayload, ItemId, ParentId, Payload, RemoteItem};
use crate::remote::RemoteItemService;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Remote Item Service with failure injection on top of [`MemoryItemService`].
pub(crate) struct FlakyRemote<P> {
    pub(crate) inner: MemoryItemService<P>,
    failing_ids: Mutex<HashSet<ItemId>>,
    fail_creates: AtomicBool,
    unreachable: AtomicBool,
    listing: Mutex<Option<Value>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    writes: AtomicUsize,
}

impl<P: Payload> FlakyRemote<P> {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryItemService::new(),
            failing_ids: Mutex::new(HashSet::new()),
            fail_creates: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            listing: Mutex::new(None),
            gate: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make update/delete requests for `id` fail until cleared.
    pub(crate) fn fail_item(&self, id: &ItemId) {
        self.failing_ids.lock().expect("failing ids").insert(id.clone());
    }

    pub(crate) fn heal_item(&self, id: &ItemId) {
        self.failing_ids.lock().expect("failing ids").remove(id);
    }

    pub(crate) fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Return `raw` from every listing instead of the stored items.
    pub(crate) fn override_listing(&self, raw: Value) {
        *self.listing.lock().expect("listing") = Some(raw);
    }

    /// Hold every subsequent request until permits are added to the returned semaphore.
    pub(crate) fn hold_requests(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().expect("gate") = Some(gate.clone());
        gate
    }

    /// Number of create/update/delete requests received.
    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), RemoteError> {
        let gate = self.gate.lock().expect("gate").clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_item(&self, id: &ItemId) -> Result<(), RemoteError> {
        if self.failing_ids.lock().expect("failing ids").contains(id) {
            return Err(RemoteError::Rejected(format!("write for '{}' refused", id)));
        }
        Ok(())
    }
}

impl FlakyRemote<EntryPayload> {
    /// Create one item per title, in order.
    pub(crate) fn seed(
        &self,
        parent_id: &ParentId,
        titles: &[&str],
    ) -> Vec<RemoteItem<EntryPayload>> {
        titles
            .iter()
            .map(|title| {
                self.inner
                    .create(parent_id, EntryPayload::titled(*title), None)
                    .expect("seed item")
            })
            .collect()
    }

    /// Stored titles of `parent_id` in remote position order.
    pub(crate) fn remote_titles(&self, parent_id: &ParentId) -> Vec<String> {
        self.inner
            .list(parent_id)
            .expect("list")
            .into_iter()
            .map(|item| item.payload.title)
            .collect()
    }
}

#[async_trait]
impl<P: Payload> RemoteItemService<P> for FlakyRemote<P> {
    async fn list_items(&self, parent_id: &ParentId) -> Result<Value, RemoteError> {
        self.enter().await?;
        let listing = self.listing.lock().expect("listing").clone();
        match listing {
            Some(raw) => Ok(raw),
            None => self.inner.list_items(parent_id).await,
        }
    }

    async fn create_item(
        &self,
        parent_id: &ParentId,
        payload: &P,
        position: usize,
    ) -> Result<RemoteItem<P>, RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected("create refused".to_string()));
        }
        self.inner.create_item(parent_id, payload, position).await
    }

    async fn update_item(
        &self,
        id: &ItemId,
        position: usize,
        payload: &P,
    ) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        self.check_item(id)?;
        self.inner.update_item(id, position, payload).await
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        self.check_item(id)?;
        self.inner.delete_item(id).await
    }
}
