//! Deadline enforcement for gateway calls.

use async_trait::async_trait;
use hackhub_core::{RowId, StorageError, StorageResult};
use std::future::Future;
use std::time::Duration;

use crate::gateway::{Document, PersistenceGateway, Record, RecordKey};

/// Gateway decorator that bounds every call with a deadline.
///
/// A call that does not finish in time fails with the retryable
/// [`StorageError::Timeout`] instead of blocking its caller.
///
/// On timeout the inner future is dropped. For `insert` and `update` the
/// outcome is then indeterminate: a backend that already accepted the
/// request may still apply the write after the caller has seen `Timeout`.
/// Callers must treat a timed-out write as possibly landed and resync any
/// cached copy before trusting it.
#[derive(Debug, Clone)]
pub struct TimedGateway<G> {
    inner: G,
    timeout: Duration,
}

impl<G> TimedGateway<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, call: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(operation, after_ms, "Gateway call exceeded its deadline");
                Err(StorageError::Timeout {
                    operation: operation.to_string(),
                    after_ms,
                })
            }
        }
    }
}

#[async_trait]
impl<G: PersistenceGateway> PersistenceGateway for TimedGateway<G> {
    async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
        self.with_deadline("read_one", self.inner.read_one(key)).await
    }

    async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
        self.with_deadline("read_all", self.inner.read_all(collection))
            .await
    }

    async fn insert(&self, record: Record) -> StorageResult<RowId> {
        self.with_deadline("insert", self.inner.insert(record)).await
    }

    async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
        self.with_deadline("update", self.inner.update(key, fields))
            .await
    }
}
