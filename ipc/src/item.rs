//! Items posted through conduits

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a posted item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an item ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({})", self.0)
    }
}

/// Type-erased item payload
///
/// Serialized with JSON. The conduit only moves the bytes around.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemPayload {
    data: Vec<u8>,
}

impl ItemPayload {
    /// Creates a new payload from serializable data
    pub fn new<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(data)?;
        Ok(Self { data: json })
    }

    /// Creates a payload from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Deserializes the payload into a specific type
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Checks if the payload carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A posted item
///
/// Two items are equal iff their ids are equal. Clones keep the id, so
/// the copy handed to each drain is "the same item" for drain tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Identity used for drain tracking
    pub id: ItemId,
    /// Numeric discriminant (message type, opcode, or a plain number)
    pub kind: u64,
    /// Opaque payload
    pub payload: ItemPayload,
}

impl Item {
    /// Creates an item with a fresh id
    pub fn new(kind: u64, payload: ItemPayload) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            payload,
        }
    }

    /// Creates an item with no payload
    pub fn signal(kind: u64) -> Self {
        Self::new(kind, ItemPayload::default())
    }

    /// Creates a numeric item: the kind is `value` and the payload is `value`
    pub fn numeric(value: u64) -> Self {
        Self::new(value, ItemPayload::from_bytes(value.to_string().into_bytes()))
    }

    /// Creates an item whose payload is `data` serialized as JSON
    pub fn from_value<T: Serialize>(kind: u64, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, ItemPayload::new(data)?))
    }

    /// Reads the payload of a numeric item
    pub fn as_numeric(&self) -> Option<u64> {
        self.payload.deserialize().ok()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.kind)
    }
}
