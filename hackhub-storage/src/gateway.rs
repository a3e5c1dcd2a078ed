//! Persistence gateway abstraction.
//!
//! The cache and achievement layers only ever talk to durable storage through
//! [`PersistenceGateway`]. Records are JSON documents addressed by a
//! collection name and an id, which keeps the interface independent of any
//! concrete store.

use async_trait::async_trait;
use hackhub_core::{RowId, StorageError, StorageResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Field map of a stored record.
pub type Document = serde_json::Map<String, Value>;

/// Address of a record: collection plus id within the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub collection: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub document: Document,
}

impl Record {
    pub fn new(key: RecordKey, document: Document) -> Self {
        Self { key, document }
    }

    /// Encode a serializable value as the record's document.
    ///
    /// Fails with [`StorageError::Decode`] when the value does not serialize
    /// to a JSON object.
    pub fn encode<T: Serialize>(key: RecordKey, value: &T) -> StorageResult<Self> {
        let encoded = serde_json::to_value(value).map_err(|e| StorageError::Decode {
            collection: key.collection.clone(),
            reason: e.to_string(),
        })?;
        match encoded {
            Value::Object(document) => Ok(Self { key, document }),
            other => Err(StorageError::Decode {
                collection: key.collection.clone(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }

    /// Decode the document into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_value(Value::Object(self.document.clone())).map_err(|e| {
            StorageError::Decode {
                collection: self.key.collection.clone(),
                reason: format!("{} ({})", e, self.key.id),
            }
        })
    }
}

/// Read/insert/update primitives against durable storage.
///
/// Implementations must be safe to share between tasks. Every error is
/// reported as a [`StorageError`]; callers do not retry internally.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Read one record, or `None` if it does not exist.
    async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>>;

    /// Read every record of a collection.
    async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>>;

    /// Insert a new record.
    ///
    /// Fails with [`StorageError::Conflict`] if a record with the same key
    /// already exists.
    async fn insert(&self, record: Record) -> StorageResult<RowId>;

    /// Merge `fields` into an existing record.
    ///
    /// Fails with [`StorageError::NotFound`] if the record does not exist.
    async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()>;
}

#[async_trait]
impl<G: PersistenceGateway + ?Sized> PersistenceGateway for Arc<G> {
    async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
        (**self).read_one(key).await
    }

    async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
        (**self).read_all(collection).await
    }

    async fn insert(&self, record: Record) -> StorageResult<RowId> {
        (**self).insert(record).await
    }

    async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
        (**self).update(key, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Location {
        city: String,
        country_code: String,
    }

    #[test]
    fn test_record_encode_decode() {
        let key = RecordKey::new("map_locations", "1");
        let location = Location {
            city: "Manchester".to_string(),
            country_code: "GB".to_string(),
        };

        let record = Record::encode(key.clone(), &location).unwrap();
        assert_eq!(record.document["countryCode"], Value::from("GB"));
        assert_eq!(record.decode::<Location>().unwrap(), location);
    }

    #[test]
    fn test_record_encode_rejects_non_object() {
        let err = Record::encode(RecordKey::new("numbers", "1"), &42).unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[test]
    fn test_record_decode_reports_collection() {
        let record = Record::new(RecordKey::new("map_locations", "7"), Document::new());
        match record.decode::<Location>() {
            Err(StorageError::Decode { collection, reason }) => {
                assert_eq!(collection, "map_locations");
                assert!(reason.contains("(7)"));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_record_key_display() {
        assert_eq!(RecordKey::new("events", "42").to_string(), "events/42");
    }
}
