//! Remote sync coordination for one collection.
//!
//! [`Collection`] is the entry point a presentation layer talks to: it owns the
//! [`SequenceStore`], applies local operations, and persists the order through a
//! [`RemoteItemService`]. Every remote write runs on its own task and reconciles the
//! store when it resolves, so dropping a caller's future never strands an item in
//! `Syncing`.

use crate::error::{RemoteError, SequenceError};
use crate::loader::{load_collection, LoadStatus};
use crate::models::{ItemId, ItemKey, ParentId, Payload, SequenceItem};
use crate::ops::{Applied, Operation};
use crate::remote::RemoteItemService;
use crate::store::{PendingChange, SequenceStore, SyncState};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Remote write issued for a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Result of one item's remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Key the item had when the write was issued.
    pub key: ItemKey,
    pub kind: ChangeKind,
    /// Key after reconciliation (the server id for creates), or the failure.
    pub result: Result<ItemKey, SequenceError>,
    unreachable: bool,
}

impl ItemOutcome {
    fn succeeded(key: ItemKey, kind: ChangeKind, final_key: ItemKey) -> Self {
        Self {
            key,
            kind,
            result: Ok(final_key),
            unreachable: false,
        }
    }

    fn failed(key: ItemKey, kind: ChangeKind, err: &RemoteError) -> Self {
        Self {
            result: Err(SequenceError::sync_failure(key.clone(), err)),
            key,
            kind,
            unreachable: err.is_unavailable(),
        }
    }

    fn aborted(key: ItemKey, kind: ChangeKind, err: SequenceError) -> Self {
        Self {
            key,
            kind,
            result: Err(err),
            unreachable: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Complete per-item report of a `save_order` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    outcomes: Vec<ItemOutcome>,
    batch_error: Option<SequenceError>,
}

impl SyncResult {
    fn from_outcomes(outcomes: Vec<ItemOutcome>) -> Self {
        let batch_error = (!outcomes.is_empty() && outcomes.iter().all(|o| o.unreachable))
            .then(|| {
                SequenceError::RemoteUnavailable(format!(
                    "all {} writes failed to reach the service",
                    outcomes.len()
                ))
            });
        Self {
            outcomes,
            batch_error,
        }
    }

    fn aborted(err: SequenceError) -> Self {
        Self {
            outcomes: Vec::new(),
            batch_error: Some(err),
        }
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// `RemoteUnavailable` when no write in the batch reached the service,
    /// or the error that prevented the batch from starting.
    pub fn batch_error(&self) -> Option<&SequenceError> {
        self.batch_error.as_ref()
    }

    /// `true` when every write succeeded (vacuously for an empty batch).
    pub fn is_success(&self) -> bool {
        self.batch_error.is_none() && self.outcomes.iter().all(ItemOutcome::is_success)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

fn lock_store<P>(
    store: &Mutex<SequenceStore<P>>,
) -> Result<MutexGuard<'_, SequenceStore<P>>, SequenceError> {
    store.lock().map_err(|_| SequenceError::StatePoisoned)
}

/// Handles shared by the coordinator and its spawned write tasks.
struct SyncTask<P: Payload> {
    store: Arc<Mutex<SequenceStore<P>>>,
    remote: Arc<dyn RemoteItemService<P>>,
    idle: Arc<Notify>,
}

impl<P: Payload> SyncTask<P> {
    async fn run(self, parent_id: ParentId, change: PendingChange<P>) -> ItemOutcome {
        let outcome = match change {
            PendingChange::Upsert(item) => match item.key.clone() {
                ItemKey::Remote(id) => self.update(id, item).await,
                ItemKey::Pending(_) => self.create(&parent_id, item).await,
            },
            PendingChange::Remove(id) => self.delete(id).await,
        };
        self.idle.notify_waiters();
        outcome
    }

    fn reconcile<F>(&self, key: &ItemKey, kind: ChangeKind, f: F) -> Option<ItemOutcome>
    where
        F: FnOnce(&mut SequenceStore<P>),
    {
        match lock_store(&self.store) {
            Ok(mut store) => {
                f(&mut store);
                None
            }
            Err(err) => Some(ItemOutcome::aborted(key.clone(), kind, err)),
        }
    }

    async fn update(&self, id: ItemId, item: SequenceItem<P>) -> ItemOutcome {
        let key = item.key.clone();
        tracing::debug!(item = %id, position = item.position, "Sending position update");
        match self.remote.update_item(&id, item.position, &item.payload).await {
            Ok(()) => self
                .reconcile(&key, ChangeKind::Update, |store| {
                    store.reconcile_written(&key, item.position)
                })
                .unwrap_or_else(|| {
                    ItemOutcome::succeeded(key.clone(), ChangeKind::Update, key.clone())
                }),
            // Resending can never succeed once the service has lost the item.
            Err(RemoteError::NotFound(_)) => {
                tracing::warn!(item = %id, "Item no longer exists remotely; dropping it");
                self.reconcile(&key, ChangeKind::Update, |store| store.drop_vanished(&key))
                    .unwrap_or_else(|| {
                        ItemOutcome::aborted(
                            key.clone(),
                            ChangeKind::Update,
                            SequenceError::ItemNotFound(key.clone()),
                        )
                    })
            }
            Err(err) => {
                tracing::warn!(item = %id, "Position update failed: {}", err);
                self.reconcile(&key, ChangeKind::Update, |store| {
                    store.mark_failed(&key, err.to_string())
                })
                .unwrap_or_else(|| ItemOutcome::failed(key.clone(), ChangeKind::Update, &err))
            }
        }
    }

    async fn create(&self, parent_id: &ParentId, item: SequenceItem<P>) -> ItemOutcome {
        let key = item.key.clone();
        tracing::debug!(item = %key, position = item.position, "Creating item");
        match self
            .remote
            .create_item(parent_id, &item.payload, item.position)
            .await
        {
            Ok(created) => {
                let created_id = created.id.clone();
                let confirmed = lock_store(&self.store)
                    .and_then(|mut store| store.confirm_created(&key, created));
                match confirmed {
                    Ok(final_key) => ItemOutcome::succeeded(key, ChangeKind::Create, final_key),
                    Err(err) => {
                        tracing::error!(
                            item = %created_id,
                            "Created item could not be reconciled: {}",
                            err
                        );
                        ItemOutcome::aborted(key, ChangeKind::Create, err)
                    }
                }
            }
            Err(err) => {
                tracing::warn!(item = %key, "Create failed: {}", err);
                self.reconcile(&key, ChangeKind::Create, |store| {
                    store.mark_failed(&key, err.to_string())
                })
                .unwrap_or_else(|| ItemOutcome::failed(key.clone(), ChangeKind::Create, &err))
            }
        }
    }

    async fn delete(&self, id: ItemId) -> ItemOutcome {
        let key = ItemKey::Remote(id.clone());
        tracing::debug!(item = %id, "Deleting item");
        match self.remote.delete_item(&id).await {
            // Already gone remotely counts as deleted.
            Ok(()) | Err(RemoteError::NotFound(_)) => self
                .reconcile(&key, ChangeKind::Delete, |store| store.mark_synced(&key))
                .unwrap_or_else(|| {
                    ItemOutcome::succeeded(key.clone(), ChangeKind::Delete, key.clone())
                }),
            Err(err) => {
                tracing::warn!(item = %id, "Delete failed: {}", err);
                self.reconcile(&key, ChangeKind::Delete, |store| {
                    store.mark_failed(&key, err.to_string())
                })
                .unwrap_or_else(|| ItemOutcome::failed(key.clone(), ChangeKind::Delete, &err))
            }
        }
    }
}

/// One collection session: local ordered state plus its remote store of record.
pub struct Collection<P: Payload> {
    store: Arc<Mutex<SequenceStore<P>>>,
    remote: Arc<dyn RemoteItemService<P>>,
    idle: Arc<Notify>,
}

impl<P: Payload> Clone for Collection<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            idle: Arc::clone(&self.idle),
        }
    }
}

impl<P: Payload> Collection<P> {
    /// Wrap an existing store.
    pub fn new(remote: Arc<dyn RemoteItemService<P>>, store: SequenceStore<P>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            remote,
            idle: Arc::new(Notify::new()),
        }
    }

    /// Load `parent_id` from `remote`. A failed load yields an empty collection.
    pub async fn load(
        remote: Arc<dyn RemoteItemService<P>>,
        parent_id: ParentId,
    ) -> (Self, LoadStatus) {
        let loaded = load_collection(remote.as_ref(), parent_id).await;
        (Self::new(remote, loaded.store), loaded.status)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SequenceStore<P>>, SequenceError> {
        lock_store(&self.store)
    }

    fn task(&self) -> SyncTask<P> {
        SyncTask {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            idle: Arc::clone(&self.idle),
        }
    }

    pub fn parent_id(&self) -> Result<ParentId, SequenceError> {
        Ok(self.lock()?.parent_id().clone())
    }

    /// Read-only copy of the current order for rendering.
    pub fn snapshot(&self) -> Result<Vec<SequenceItem<P>>, SequenceError> {
        Ok(self.lock()?.current().to_vec())
    }

    pub fn state_of(&self, key: &ItemKey) -> Result<SyncState, SequenceError> {
        Ok(self.lock()?.state(key))
    }

    pub fn pending_items(&self) -> Result<Vec<SequenceItem<P>>, SequenceError> {
        Ok(self.lock()?.pending_items())
    }

    /// Run `f` against the store under its lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&SequenceStore<P>) -> R) -> Result<R, SequenceError> {
        Ok(f(&*self.lock()?))
    }

    /// Apply a local operation. Nothing is sent until [`Self::save_order`].
    pub fn apply(&self, op: Operation<P>) -> Result<Applied, SequenceError> {
        self.lock()?.apply(op)
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<Applied, SequenceError> {
        self.apply(Operation::Move { from, to })
    }

    pub fn insert(&self, payload: P, at: Option<usize>) -> Result<Applied, SequenceError> {
        self.apply(Operation::Insert { payload, at })
    }

    pub fn delete(&self, key: &ItemKey) -> Result<Applied, SequenceError> {
        self.apply(Operation::Delete { key: key.clone() })
    }

    // Waits for any in-flight write to resolve before claiming the pending set.
    async fn claim_pending(&self) -> Result<(ParentId, Vec<PendingChange<P>>), SequenceError> {
        loop {
            let idle = self.idle.notified();
            {
                let mut store = self.lock()?;
                if !store.is_syncing() {
                    let parent_id = store.parent_id().clone();
                    return Ok((parent_id, store.begin_sync()));
                }
            }
            idle.await;
        }
    }

    /// Persist every pending change concurrently and report each item's outcome.
    ///
    /// Failures never roll back other items: successful writes settle, failed ones stay
    /// pending for the next call.
    pub async fn save_order(&self) -> SyncResult {
        let (parent_id, changes) = match self.claim_pending().await {
            Ok(claimed) => claimed,
            Err(err) => return SyncResult::aborted(err),
        };
        if changes.is_empty() {
            return SyncResult::default();
        }
        tracing::info!(parent = %parent_id, count = changes.len(), "Saving collection order");

        let handles: Vec<_> = changes
            .into_iter()
            .map(|change| {
                let key = change.key();
                let kind = match &change {
                    PendingChange::Upsert(item) if item.key.is_pending() => ChangeKind::Create,
                    PendingChange::Upsert(_) => ChangeKind::Update,
                    PendingChange::Remove(_) => ChangeKind::Delete,
                };
                let handle = tokio::spawn(self.task().run(parent_id.clone(), change));
                (key, kind, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, kind, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let reason = format!("sync task failed: {}", join_err);
                    tracing::error!(item = %key, "{}", reason);
                    if let Ok(mut store) = self.lock() {
                        store.mark_failed(&key, reason.clone());
                    }
                    self.idle.notify_waiters();
                    ItemOutcome::aborted(
                        key.clone(),
                        kind,
                        SequenceError::SyncItemFailure { key, reason },
                    )
                }
            };
            outcomes.push(outcome);
        }

        let result = SyncResult::from_outcomes(outcomes);
        if let Some(err) = result.batch_error() {
            tracing::warn!(parent = %parent_id, "{}", err);
        } else {
            tracing::info!(
                parent = %parent_id,
                succeeded = result.succeeded().count(),
                failed = result.failed().count(),
                "Save finished"
            );
        }
        result
    }

    /// Create `payload` remotely at the end of the collection.
    ///
    /// A placeholder is appended immediately and swapped for the server identity on
    /// success. On failure the placeholder is removed and the error returned.
    pub async fn add_item(&self, payload: P) -> Result<SequenceItem<P>, SequenceError> {
        let (parent_id, placeholder) = {
            let mut store = self.lock()?;
            let placeholder = store.begin_create(payload);
            (store.parent_id().clone(), placeholder)
        };
        let task = self.task();
        let handle = tokio::spawn(async move {
            let result = task
                .remote
                .create_item(&parent_id, &placeholder.payload, placeholder.position)
                .await;
            let reconciled = lock_store(&task.store).and_then(|mut store| match result {
                Ok(created) => {
                    let key = store.confirm_created(&placeholder.key, created)?;
                    store
                        .get(&key)
                        .cloned()
                        .ok_or(SequenceError::ItemNotFound(key))
                }
                Err(err) => {
                    tracing::warn!(parent = %parent_id, "Create failed: {}", err);
                    store.discard_placeholder(&placeholder.key);
                    Err(SequenceError::sync_failure(placeholder.key.clone(), &err))
                }
            });
            task.idle.notify_waiters();
            reconciled
        });
        handle.await.map_err(|join_err| SequenceError::RemoteUnavailable(join_err.to_string()))?
    }

    /// Delete `id` remotely, then locally.
    ///
    /// Refused with [`SequenceError::ItemSyncing`] while the item or any item after it
    /// has a write in flight. On failure the item stays in place with its previous sync
    /// state.
    pub async fn remove_item(&self, id: &ItemId) -> Result<(), SequenceError> {
        let key = ItemKey::Remote(id.clone());
        let previous = self.lock()?.begin_removal(&key)?;
        let task = self.task();
        let id = id.clone();
        let handle = tokio::spawn(async move {
            let result = task.remote.delete_item(&id).await;
            let reconciled = lock_store(&task.store).and_then(|mut store| match result {
                Ok(()) | Err(RemoteError::NotFound(_)) => {
                    store.remove_confirmed(&key);
                    Ok(())
                }
                Err(err) => {
                    tracing::warn!(item = %id, "Delete failed: {}", err);
                    store.restore_state(&key, previous, err.to_string());
                    Err(SequenceError::sync_failure(key.clone(), &err))
                }
            });
            task.idle.notify_waiters();
            reconciled
        });
        handle.await.map_err(|join_err| SequenceError::RemoteUnavailable(join_err.to_string()))?
    }
}
