//! Positioned collection items and the identities that address them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Domain fields carried by an item. Opaque to the engine and passed through unchanged.
pub trait Payload:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Payload for T where
    T: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Server-assigned item identifier. Never minted by the engine for existing items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identifier. Only a Remote Item Service should call this.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of the collection that owns a set of items (a module, a court, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ParentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client-side identity for an item the remote store has not created yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(Uuid);

impl PlaceholderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending:{}", self.0)
    }
}

/// Identity of an item inside a sequence store.
///
/// Placeholder and server identities live in separate variants so a substitution
/// after a successful create can never be confused with an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKey {
    Remote(ItemId),
    Pending(PlaceholderId),
}

impl ItemKey {
    pub fn remote_id(&self) -> Option<&ItemId> {
        match self {
            Self::Remote(id) => Some(id),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => id.fmt(f),
            Self::Pending(placeholder) => placeholder.fmt(f),
        }
    }
}

impl From<ItemId> for ItemKey {
    fn from(value: ItemId) -> Self {
        Self::Remote(value)
    }
}

impl From<PlaceholderId> for ItemKey {
    fn from(value: PlaceholderId) -> Self {
        Self::Pending(value)
    }
}

/// One positioned element of an in-memory collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceItem<P> {
    pub key: ItemKey,
    pub parent_id: ParentId,
    pub position: usize,
    pub payload: P,
}

impl<P> SequenceItem<P> {
    /// Create a placeholder item for a not-yet-created payload.
    pub fn placeholder(parent_id: ParentId, payload: P) -> Self {
        Self {
            key: ItemKey::Pending(PlaceholderId::new()),
            parent_id,
            position: 0,
            payload,
        }
    }

    pub fn remote_id(&self) -> Option<&ItemId> {
        self.key.remote_id()
    }
}

impl<P> From<RemoteItem<P>> for SequenceItem<P> {
    fn from(item: RemoteItem<P>) -> Self {
        Self {
            key: ItemKey::Remote(item.id),
            parent_id: item.parent_id,
            position: item.position,
            payload: item.payload,
        }
    }
}

/// Item as stored and returned by the Remote Item Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem<P> {
    pub id: ItemId,
    pub parent_id: ParentId,
    pub position: usize,
    pub payload: P,
}

/// Request payload for creating an item. A missing position appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest<P> {
    pub payload: P,
    pub position: Option<usize>,
}

/// Request payload for updating an item. Only the supplied fields are overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemRequest<P> {
    pub position: Option<usize>,
    pub payload: Option<P>,
}
