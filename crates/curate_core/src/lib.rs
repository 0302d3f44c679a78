//! Ordered-collection reconciliation engine for Curate (models, reorder ops, sync).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants used across Curate crates.
pub mod constants;
/// Engine and remote error types.
pub mod error;
#[cfg(feature = "http")]
/// HTTP client for the Remote Item Service REST API.
pub mod http;
/// Initial collection fetch and validation.
pub mod loader;
/// In-memory Remote Item Service.
pub mod memory;
/// Collection items, identities, payloads and request bodies.
pub mod models;
/// Dense position index normalization.
pub mod normalize;
/// Structural reorder operations (move, insert, delete).
pub mod ops;
/// Remote Item Service contract.
pub mod remote;
/// In-memory ordered state with pending-change tracking.
pub mod store;
/// Remote sync coordination and per-item reconciliation.
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use constants::{DEFAULT_PORT, DEFAULT_SERVER_URL};
pub use error::{RemoteError, SequenceError};
pub use loader::{load_collection, LoadStatus, Loaded};
pub use memory::MemoryItemService;
pub use models::{
    EntryPayload, ItemId, ItemKey, ParentId, Payload, PlaceholderId, RemoteItem, SequenceItem,
};
pub use ops::{Applied, Operation};
pub use remote::RemoteItemService;
pub use store::{PendingChange, SequenceStore, SyncState};
pub use sync::{ChangeKind, Collection, ItemOutcome, SyncResult};
