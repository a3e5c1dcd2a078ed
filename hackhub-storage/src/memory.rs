//! In-memory persistence gateway.
//!
//! Reference implementation of [`PersistenceGateway`] used by tests and
//! local runs. Rows keep their insertion order through monotonically
//! increasing row ids.

use async_trait::async_trait;
use hackhub_core::{RowId, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::gateway::{Document, PersistenceGateway, Record, RecordKey};

#[derive(Debug, Clone)]
struct StoredRow {
    row_id: RowId,
    document: Document,
}

type Collections = HashMap<String, HashMap<String, StoredRow>>;

/// In-memory gateway for testing and local development.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    collections: RwLock<Collections>,
    next_row_id: AtomicU64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a collection.
    pub fn len(&self, collection: &str) -> StorageResult<usize> {
        Ok(self
            .read_guard()?
            .get(collection)
            .map(HashMap::len)
            .unwrap_or(0))
    }

    /// Whether a collection has no rows.
    pub fn is_empty(&self, collection: &str) -> StorageResult<bool> {
        self.len(collection).map(|n| n == 0)
    }

    fn read_guard(&self) -> StorageResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| StorageError::LockPoisoned)
    }

    fn write_guard(&self) -> StorageResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
        let collections = self.read_guard()?;
        Ok(collections
            .get(&key.collection)
            .and_then(|rows| rows.get(&key.id))
            .map(|row| Record::new(key.clone(), row.document.clone())))
    }

    async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
        let collections = self.read_guard()?;
        let Some(rows) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut ordered: Vec<(&String, &StoredRow)> = rows.iter().collect();
        ordered.sort_by_key(|(_, row)| row.row_id);

        Ok(ordered
            .into_iter()
            .map(|(id, row)| {
                Record::new(
                    RecordKey::new(collection, id.clone()),
                    row.document.clone(),
                )
            })
            .collect())
    }

    async fn insert(&self, record: Record) -> StorageResult<RowId> {
        let mut collections = self.write_guard()?;
        let rows = collections.entry(record.key.collection.clone()).or_default();
        if rows.contains_key(&record.key.id) {
            return Err(StorageError::Conflict {
                collection: record.key.collection,
                id: record.key.id,
            });
        }

        let row_id = self.next_row_id.fetch_add(1, Ordering::SeqCst) + 1;
        rows.insert(
            record.key.id,
            StoredRow {
                row_id,
                document: record.document,
            },
        );
        Ok(row_id)
    }

    async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
        let mut collections = self.write_guard()?;
        let row = collections
            .get_mut(&key.collection)
            .and_then(|rows| rows.get_mut(&key.id))
            .ok_or_else(|| StorageError::NotFound {
                collection: key.collection.clone(),
                id: key.id.clone(),
            })?;

        for (field, value) in fields {
            row.document.insert(field, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[tokio::test]
    async fn test_insert_read_one() {
        let gateway = InMemoryGateway::new();
        let key = RecordKey::new("events", "opening");

        let row_id = gateway
            .insert(Record::new(key.clone(), doc(json!({"title": "Opening"}))))
            .await
            .unwrap();
        assert_eq!(row_id, 1);

        let record = gateway.read_one(&key).await.unwrap().unwrap();
        assert_eq!(record.document["title"], json!("Opening"));
    }

    #[tokio::test]
    async fn test_read_one_missing() {
        let gateway = InMemoryGateway::new();
        let missing = gateway
            .read_one(&RecordKey::new("events", "nope"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let gateway = InMemoryGateway::new();
        let key = RecordKey::new("events", "opening");

        gateway
            .insert(Record::new(key.clone(), Document::new()))
            .await
            .unwrap();
        let err = gateway
            .insert(Record::new(key, Document::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let gateway = InMemoryGateway::new();
        let key = RecordKey::new("achievement_progress", "a:u");
        gateway
            .insert(Record::new(
                key.clone(),
                doc(json!({"achievementId": "a", "progress": 1})),
            ))
            .await
            .unwrap();

        gateway
            .update(&key, doc(json!({"progress": 2})))
            .await
            .unwrap();

        let record = gateway.read_one(&key).await.unwrap().unwrap();
        assert_eq!(record.document["progress"], json!(2));
        assert_eq!(record.document["achievementId"], json!("a"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let gateway = InMemoryGateway::new();
        let err = gateway
            .update(&RecordKey::new("events", "ghost"), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_read_all_keeps_insertion_order() {
        let gateway = InMemoryGateway::new();
        for id in ["zeta", "alpha", "mid"] {
            gateway
                .insert(Record::new(RecordKey::new("events", id), Document::new()))
                .await
                .unwrap();
        }

        let ids: Vec<String> = gateway
            .read_all("events")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key.id)
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(gateway.len("events").unwrap(), 3);
        assert!(gateway.is_empty("locations").unwrap());
    }
}
