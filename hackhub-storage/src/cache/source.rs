//! Sources that cache entries and collections resynchronise from.

use async_trait::async_trait;
use hackhub_core::StorageResult;
use std::fmt::Debug;
use std::hash::Hash;

/// Authoritative source for a single cached value.
///
/// This is the injected fetch function of a [`CacheEntry`](super::CacheEntry):
/// the entry owns TTL and freshness state, the source owns the I/O.
#[async_trait]
pub trait EntrySource: Send + Sync + 'static {
    /// Key identifying one value within the source.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// The cached value.
    type Value: Clone + Send + Sync + 'static;

    /// Fetch the current value for `key`, or `None` if it does not exist.
    async fn fetch_one(&self, key: &Self::Key) -> StorageResult<Option<Self::Value>>;
}

/// Authoritative source for a keyed collection of values.
#[async_trait]
pub trait CollectionSource: EntrySource {
    /// Fetch the full membership with current values.
    async fn fetch_all(&self) -> StorageResult<Vec<(Self::Key, Self::Value)>>;
}
