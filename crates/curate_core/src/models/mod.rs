//! Data models for collection items, identities and API request bodies.

/// Item identities, positioned items and wire shapes.
pub mod item;
/// Concrete payload used by the learning-module surfaces.
pub mod payload;

pub use item::{
    CreateItemRequest, ItemId, ItemKey, ParentId, Payload, PlaceholderId, RemoteItem,
    SequenceItem, UpdateItemRequest,
};
pub use payload::EntryPayload;

#[cfg(test)]
mod tests;
