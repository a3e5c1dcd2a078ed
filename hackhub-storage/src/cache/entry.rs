//! Single cached value with time-to-live and lazy resynchronisation.

use hackhub_core::{StorageResult, Ttl};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::source::EntrySource;

#[derive(Debug)]
struct EntryState<V> {
    value: Option<V>,
    last_synced_at: Option<Instant>,
    /// Bumped by every `set` and `invalidate`; a refresh that saw an older
    /// generation must not install its fetch.
    generation: u64,
}

/// Whether a value last synced at `last_synced_at` is stale under `ttl`.
///
/// A value that was never synced is always stale, whatever the TTL: there
/// is nothing to serve yet.
pub(crate) fn is_stale(ttl: Ttl, last_synced_at: Option<Instant>) -> bool {
    match last_synced_at {
        None => true,
        Some(at) => ttl.is_elapsed(at.elapsed()),
    }
}

/// One persisted value plus its freshness state.
///
/// Reads follow a sync-before-read policy: an expired entry is refreshed
/// from its source before the value is returned, and a failed refresh fails
/// the read. Concurrent readers of an expired entry share a single refresh.
///
/// Writes win over refreshes that started before them: a fetch issued
/// before a [`set`](Self::set) or [`invalidate`](Self::invalidate) is
/// discarded rather than installed over the newer state.
pub struct CacheEntry<S: EntrySource> {
    key: S::Key,
    ttl: Ttl,
    source: Arc<S>,
    state: RwLock<EntryState<S::Value>>,
    /// Held by the one caller refreshing this entry.
    sync_gate: Mutex<()>,
    syncs: AtomicU64,
}

impl<S: EntrySource> CacheEntry<S> {
    /// Create an entry that will sync on first read.
    pub fn new(key: S::Key, ttl: Ttl, source: Arc<S>) -> Self {
        Self::with_state(key, ttl, source, None, None)
    }

    /// Create an entry holding a value that was just read from the source.
    pub fn with_value(key: S::Key, ttl: Ttl, source: Arc<S>, value: Option<S::Value>) -> Self {
        Self::with_state(key, ttl, source, value, Some(Instant::now()))
    }

    fn with_state(
        key: S::Key,
        ttl: Ttl,
        source: Arc<S>,
        value: Option<S::Value>,
        last_synced_at: Option<Instant>,
    ) -> Self {
        Self {
            key,
            ttl,
            source,
            state: RwLock::new(EntryState {
                value,
                last_synced_at,
                generation: 0,
            }),
            sync_gate: Mutex::new(()),
            syncs: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &S::Key {
        &self.key
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn last_synced_at(&self) -> Option<Instant> {
        self.read_state().last_synced_at
    }

    /// Number of times this entry has fetched from its source.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }

    /// Whether the entry must be refreshed before it can be trusted.
    pub fn is_expired(&self) -> bool {
        is_stale(self.ttl, self.read_state().last_synced_at)
    }

    /// Refresh the value from the source.
    ///
    /// On failure the previous value and sync timestamp are left untouched.
    pub async fn sync(&self) -> StorageResult<()> {
        let _flight = self.sync_gate.lock().await;
        self.refresh().await.map(|_| ())
    }

    /// Return the value, refreshing it first if it has expired.
    pub async fn get(&self) -> StorageResult<Option<S::Value>> {
        if let Some(value) = self.fresh_value() {
            return Ok(value);
        }

        let _flight = self.sync_gate.lock().await;
        // Another caller may have refreshed while we waited for the gate.
        if let Some(value) = self.fresh_value() {
            tracing::trace!(key = ?self.key, "Joined in-flight cache sync");
            return Ok(value);
        }

        self.refresh().await
    }

    /// Replace the value after a successful persisted write.
    pub fn set(&self, value: Option<S::Value>) {
        let mut state = self.write_state();
        state.value = value;
        state.last_synced_at = Some(Instant::now());
        state.generation += 1;
    }

    /// Force the next read to resync.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.last_synced_at = None;
        state.generation += 1;
    }

    /// Fetch and install the value, returning what the caller should see.
    ///
    /// If the entry was written or invalidated while the fetch was in
    /// flight, the fetch is not installed. The caller then gets the written
    /// value, or the fetched one when the entry was only invalidated.
    async fn refresh(&self) -> StorageResult<Option<S::Value>> {
        let generation = self.read_state().generation;
        let fetched = match self.source.fetch_one(&self.key).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(key = ?self.key, error = %e, "Cache entry sync failed");
                return Err(e);
            }
        };

        let mut state = self.write_state();
        if state.generation != generation {
            tracing::debug!(key = ?self.key, "Discarded cache sync overtaken by a write");
            if is_stale(self.ttl, state.last_synced_at) {
                return Ok(fetched);
            }
            return Ok(state.value.clone());
        }

        state.value = fetched.clone();
        state.last_synced_at = Some(Instant::now());
        drop(state);
        self.syncs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = ?self.key, "Cache entry synced");
        Ok(fetched)
    }

    fn fresh_value(&self) -> Option<Option<S::Value>> {
        let state = self.read_state();
        if is_stale(self.ttl, state.last_synced_at) {
            None
        } else {
            Some(state.value.clone())
        }
    }

    // Every write is a plain field assignment, so poisoned state is still consistent.
    fn read_state(&self) -> RwLockReadGuard<'_, EntryState<S::Value>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EntryState<S::Value>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: EntrySource> std::fmt::Debug for CacheEntry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("last_synced_at", &self.last_synced_at())
            .finish()
    }
}
