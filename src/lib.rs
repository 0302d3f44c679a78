//! Root crate facade for the Curate reconciliation engine and its reference item service.

pub use curate_core::http::HttpItemService;
pub use curate_core::{
    config, load_collection, models, Applied, ChangeKind, Collection, Config, EntryPayload,
    ItemId, ItemKey, ItemOutcome, LoadStatus, Loaded, MemoryItemService, Operation, ParentId,
    Payload, RemoteError, RemoteItem, RemoteItemService, SequenceError, SequenceItem,
    SequenceStore, SyncResult, SyncState,
};
pub use curate_server::{create_app, resolve_bind_address, serve_router, AppError, AppState};
