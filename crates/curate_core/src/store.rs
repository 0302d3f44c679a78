//! In-memory ordered state for one collection, with pending-change tracking.
//!
//! The store performs no I/O. Structural changes go through [`crate::ops`] and are
//! always re-normalized before they are committed, so every observable state is settled.

use crate::error::SequenceError;
use crate::models::{ItemId, ItemKey, ParentId, RemoteItem, SequenceItem};
use crate::normalize::normalize;
use crate::ops::{self, Applied, Operation, Transition};
use std::collections::{BTreeMap, HashMap};

/// Per-item sync lifecycle: `Settled -> Dirty -> Syncing -> Settled | Dirty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncState {
    #[default]
    Settled,
    Dirty,
    Syncing,
}

/// Kind of remote write a pending change needs.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange<P> {
    /// Update for a server-backed item, create for a placeholder.
    Upsert(SequenceItem<P>),
    /// Deletion of a server-backed item removed locally.
    Remove(ItemId),
}

impl<P> PendingChange<P> {
    pub fn key(&self) -> ItemKey {
        match self {
            Self::Upsert(item) => item.key.clone(),
            Self::Remove(id) => ItemKey::Remote(id.clone()),
        }
    }
}

/// Ordered collection for one `parent_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStore<P> {
    parent_id: ParentId,
    items: Vec<SequenceItem<P>>,
    // Only non-settled entries are kept.
    states: HashMap<ItemKey, SyncState>,
    tombstones: BTreeMap<ItemId, SyncState>,
    failures: HashMap<ItemKey, String>,
}

impl<P: Clone> SequenceStore<P> {
    /// Create an empty store.
    pub fn new(parent_id: ParentId) -> Self {
        Self {
            parent_id,
            items: Vec::new(),
            states: HashMap::new(),
            tombstones: BTreeMap::new(),
            failures: HashMap::new(),
        }
    }

    /// Seed a store with items already persisted remotely, in the given order.
    ///
    /// Positions are re-normalized. Items whose stored position disagrees with their
    /// normalized one start out dirty so the next save repairs the remote order.
    pub fn from_items(parent_id: ParentId, items: Vec<SequenceItem<P>>) -> Self {
        let mut store = Self::new(parent_id);
        let normalized = normalize(items.clone());
        for key in ops::changed_positions(&items, &normalized) {
            store.states.insert(key, SyncState::Dirty);
        }
        store.items = normalized;
        store
    }

    pub fn parent_id(&self) -> &ParentId {
        &self.parent_id
    }

    /// Settled ordered sequence.
    pub fn current(&self) -> &[SequenceItem<P>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&SequenceItem<P>> {
        self.items.iter().find(|item| &item.key == key)
    }

    pub fn index_of(&self, key: &ItemKey) -> Option<usize> {
        self.items.iter().position(|item| &item.key == key)
    }

    /// Sync state of a live item or of a pending deletion.
    pub fn state(&self, key: &ItemKey) -> SyncState {
        if let Some(state) = self.states.get(key) {
            return *state;
        }
        key.remote_id()
            .and_then(|id| self.tombstones.get(id))
            .copied()
            .unwrap_or_default()
    }

    /// Reason recorded by the most recent failed write for `key`.
    pub fn last_failure(&self, key: &ItemKey) -> Option<&str> {
        self.failures.get(key).map(String::as_str)
    }

    /// Apply a structural operation and mark every repositioned item dirty.
    ///
    /// # Errors
    /// Propagates [`crate::ops`] validation errors, and returns
    /// [`SequenceError::ItemSyncing`] when the operation would reposition or remove an
    /// item whose write is in flight. The store is unchanged on error.
    pub fn apply(&mut self, op: Operation<P>) -> Result<Applied, SequenceError> {
        let transition = ops::apply(&self.items, &self.parent_id, op)?;
        if transition.applied.is_noop() {
            return Ok(transition.applied);
        }
        let touched = transition
            .applied
            .changed
            .iter()
            .chain(transition.applied.removed.iter());
        for key in touched {
            if self.state(key) == SyncState::Syncing {
                return Err(SequenceError::ItemSyncing(key.clone()));
            }
        }
        Ok(self.commit(transition))
    }

    fn commit(&mut self, transition: Transition<P>) -> Applied {
        let Transition { items, applied } = transition;
        self.items = items;
        self.mark_repositioned(&applied.changed);
        if let Some(removed) = applied.removed.as_ref() {
            self.states.remove(removed);
            self.failures.remove(removed);
            if let Some(id) = removed.remote_id() {
                self.tombstones.insert(id.clone(), SyncState::Dirty);
            }
        }
        applied
    }

    // Items already in flight keep `Syncing`; their reconciliation notices the drift.
    fn mark_repositioned(&mut self, keys: &[ItemKey]) {
        for key in keys {
            let state = self.states.entry(key.clone()).or_default();
            if *state != SyncState::Syncing {
                *state = SyncState::Dirty;
            }
        }
    }

    /// Live items that need persisting.
    pub fn pending_items(&self) -> Vec<SequenceItem<P>> {
        self.items
            .iter()
            .filter(|item| self.state(&item.key) == SyncState::Dirty)
            .cloned()
            .collect()
    }

    /// Server ids removed locally whose deletion has not been confirmed.
    pub fn pending_deletions(&self) -> Vec<ItemId> {
        self.tombstones
            .iter()
            .filter(|(_, state)| **state == SyncState::Dirty)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.states.values().any(|s| *s == SyncState::Dirty)
            || self.tombstones.values().any(|s| *s == SyncState::Dirty)
    }

    /// `true` while any write for this collection is in flight.
    pub fn is_syncing(&self) -> bool {
        self.states.values().any(|s| *s == SyncState::Syncing)
            || self.tombstones.values().any(|s| *s == SyncState::Syncing)
    }

    /// Move every dirty item and pending deletion to `Syncing` and return the writes
    /// they need.
    pub fn begin_sync(&mut self) -> Vec<PendingChange<P>> {
        let mut changes: Vec<PendingChange<P>> = self
            .pending_items()
            .into_iter()
            .map(PendingChange::Upsert)
            .collect();
        changes.extend(self.pending_deletions().into_iter().map(PendingChange::Remove));
        for change in &changes {
            self.set_state(&change.key(), SyncState::Syncing);
        }
        changes
    }

    /// Mark a live item as in flight for removal and return its previous state.
    ///
    /// Confirming the removal shifts every later item, so none of them may be in flight
    /// either.
    ///
    /// # Errors
    /// [`SequenceError::ItemNotFound`] for unknown keys and
    /// [`SequenceError::ItemSyncing`] naming the first in-flight item at or after `key`.
    pub fn begin_removal(&mut self, key: &ItemKey) -> Result<SyncState, SequenceError> {
        let index = self
            .index_of(key)
            .ok_or_else(|| SequenceError::ItemNotFound(key.clone()))?;
        if let Some(busy) = self.items[index..]
            .iter()
            .find(|item| self.state(&item.key) == SyncState::Syncing)
        {
            return Err(SequenceError::ItemSyncing(busy.key.clone()));
        }
        let previous = self.state(key);
        self.set_state(key, SyncState::Syncing);
        Ok(previous)
    }

    /// Append a placeholder for `payload` and mark it in flight.
    pub fn begin_create(&mut self, payload: P) -> SequenceItem<P> {
        let mut placeholder = SequenceItem::placeholder(self.parent_id.clone(), payload);
        placeholder.position = self.items.len();
        self.items.push(placeholder.clone());
        self.set_state(&placeholder.key, SyncState::Syncing);
        placeholder
    }

    fn set_state(&mut self, key: &ItemKey, state: SyncState) {
        if self.get(key).is_some() {
            if state == SyncState::Settled {
                self.states.remove(key);
            } else {
                self.states.insert(key.clone(), state);
            }
        } else if let Some(id) = key.remote_id() {
            if state == SyncState::Settled {
                self.tombstones.remove(id);
            } else if let Some(entry) = self.tombstones.get_mut(id) {
                *entry = state;
            }
        }
    }

    /// Record a confirmed write: the item (or deletion) becomes settled.
    pub fn mark_synced(&mut self, key: &ItemKey) {
        self.set_state(key, SyncState::Settled);
        self.failures.remove(key);
    }

    /// Record a confirmed position write, leaving the item dirty when its local
    /// position moved after the write was issued.
    pub fn reconcile_written(&mut self, key: &ItemKey, written_position: usize) {
        match self.get(key).map(|item| item.position) {
            Some(position) if position != written_position => {
                self.set_state(key, SyncState::Dirty);
                self.failures.remove(key);
            }
            _ => self.mark_synced(key),
        }
    }

    /// Record a failed write: the item stays pending and is eligible for retry.
    pub fn mark_failed(&mut self, key: &ItemKey, reason: impl Into<String>) {
        self.set_state(key, SyncState::Dirty);
        self.failures.insert(key.clone(), reason.into());
    }

    /// Put back the state an item had before [`Self::begin_removal`].
    pub fn restore_state(&mut self, key: &ItemKey, previous: SyncState, reason: impl Into<String>) {
        self.set_state(key, previous);
        self.failures.insert(key.clone(), reason.into());
    }

    /// Swap a placeholder for the server-assigned identity.
    ///
    /// The local position is kept; the server's copy of the payload wins.
    ///
    /// # Errors
    /// [`SequenceError::ItemNotFound`] when the placeholder is no longer present.
    pub fn confirm_created(
        &mut self,
        placeholder: &ItemKey,
        created: RemoteItem<P>,
    ) -> Result<ItemKey, SequenceError> {
        let index = self
            .index_of(placeholder)
            .ok_or_else(|| SequenceError::ItemNotFound(placeholder.clone()))?;
        self.states.remove(placeholder);
        self.failures.remove(placeholder);

        let key = ItemKey::Remote(created.id);
        let item = &mut self.items[index];
        item.key = key.clone();
        item.payload = created.payload;
        if item.position != created.position {
            self.states.insert(key.clone(), SyncState::Dirty);
        }
        Ok(key)
    }

    /// Drop a placeholder whose create failed, re-normalizing the rest.
    pub fn discard_placeholder(&mut self, placeholder: &ItemKey) {
        self.remove_live(placeholder);
    }

    /// Remove an item whose remote deletion succeeded.
    pub fn remove_confirmed(&mut self, key: &ItemKey) {
        self.remove_live(key);
    }

    /// Drop an item the service no longer has, re-normalizing the rest.
    pub fn drop_vanished(&mut self, key: &ItemKey) {
        self.remove_live(key);
    }

    fn remove_live(&mut self, key: &ItemKey) {
        if let Ok(Transition { items, applied }) = ops::delete_item(&self.items, key) {
            self.items = items;
            self.states.remove(key);
            self.failures.remove(key);
            self.mark_repositioned(&applied.changed);
        }
    }
}
