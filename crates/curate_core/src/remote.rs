//! Contract for the external store of record.

use crate::error::RemoteError;
use crate::models::{ItemId, ParentId, Payload, RemoteItem};
use async_trait::async_trait;

/// The four logical operations the engine needs from a Remote Item Service.
///
/// Each call is a single request/response. Timeouts and transport retries belong to the
/// implementation; the engine only distinguishes success from failure.
#[async_trait]
pub trait RemoteItemService<P: Payload>: Send + Sync {
    /// Fetch the raw listing for `parent_id`.
    ///
    /// The body is returned undecoded so the loader can degrade gracefully when it is
    /// not a well-formed list of items.
    async fn list_items(&self, parent_id: &ParentId) -> Result<serde_json::Value, RemoteError>;

    /// Create an item at `position` and return it with its server-assigned id.
    async fn create_item(
        &self,
        parent_id: &ParentId,
        payload: &P,
        position: usize,
    ) -> Result<RemoteItem<P>, RemoteError>;

    /// Persist the position and payload of an existing item. Safe to resend.
    async fn update_item(&self, id: &ItemId, position: usize, payload: &P)
        -> Result<(), RemoteError>;

    /// Delete an existing item.
    async fn delete_item(&self, id: &ItemId) -> Result<(), RemoteError>;
}
