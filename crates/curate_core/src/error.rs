//! Error types for the reconciliation engine and its remote collaborator.
use crate::models::ItemKey;
use thiserror::Error;

/// Engine-level error kinds reported to the presentation layer.
///
/// Operation errors (`InvalidIndex`, `ItemNotFound`, `ItemSyncing`) leave the store
/// unchanged. Sync errors are per item and never abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Index {index} is out of range for a collection of {len} items")]
    InvalidIndex { index: usize, len: usize },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemKey),

    #[error("Collection could not be loaded: {0}")]
    LoadError(String),

    #[error("Failed to sync item {key}: {reason}")]
    SyncItemFailure { key: ItemKey, reason: String },

    #[error("Remote item service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Item {0} is being synced; retry once the write resolves")]
    ItemSyncing(ItemKey),

    #[error("Sequence store state is poisoned")]
    StatePoisoned,
}

impl SequenceError {
    /// Build a per-item sync failure from a remote error.
    pub fn sync_failure(key: ItemKey, err: &RemoteError) -> Self {
        Self::SyncItemFailure {
            key,
            reason: err.to_string(),
        }
    }
}

/// Failure reported by a Remote Item Service implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Service unreachable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// `true` when the service could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
