//! Keyed collection of cache entries with its own membership freshness.

use hackhub_core::{StorageResult, Ttl};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::entry::{is_stale, CacheEntry};
use super::source::CollectionSource;
use super::stats::{CacheCounters, CacheStats};

struct CollectionState<S: CollectionSource> {
    last_synced_at: Option<Instant>,
    elements: HashMap<S::Key, Arc<CacheEntry<S>>>,
    /// Bumped by every `insert` and `invalidate`.
    generation: u64,
    /// Generation of the last write to each key not yet covered by a reload.
    written: HashMap<S::Key, u64>,
    invalidated_at: u64,
}

/// A keyed set of [`CacheEntry`] values.
///
/// Two TTLs apply. The collection TTL governs membership: once it lapses the
/// whole key set is refetched. The entry TTL governs each member's value:
/// once it lapses only that member is refetched. A read returns a value only
/// after both are fresh.
///
/// A membership reload never overwrites a write-through [`insert`](Self::insert)
/// made after its fetch began; such keys keep their written entry. An
/// [`invalidate`](Self::invalidate) during a reload leaves the collection
/// expired.
///
/// Membership is loaded with [`CollectionSource::fetch_all`], so every
/// reload reads the whole backing collection, not just the keys a caller
/// asks for. Keep the collection TTL long when the backing table is large.
pub struct CacheCollection<S: CollectionSource> {
    source: Arc<S>,
    ttl: Ttl,
    entry_ttl: Ttl,
    state: RwLock<CollectionState<S>>,
    /// Held by the one caller reloading membership.
    membership_gate: Mutex<()>,
    counters: CacheCounters,
}

impl<S: CollectionSource> CacheCollection<S> {
    /// Create an empty collection; membership loads on first read.
    pub fn new(source: Arc<S>, ttl: Ttl, entry_ttl: Ttl) -> Self {
        Self {
            source,
            ttl,
            entry_ttl,
            state: RwLock::new(CollectionState {
                last_synced_at: None,
                elements: HashMap::new(),
                generation: 0,
                written: HashMap::new(),
                invalidated_at: 0,
            }),
            membership_gate: Mutex::new(()),
            counters: CacheCounters::default(),
        }
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn entry_ttl(&self) -> Ttl {
        self.entry_ttl
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Whether membership must be reloaded before the next lookup.
    pub fn is_expired(&self) -> bool {
        is_stale(self.ttl, self.read_state().last_synced_at)
    }

    pub fn len(&self) -> usize {
        self.read_state().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read_state();
        let entry_syncs = state.elements.values().map(|e| e.sync_count()).sum();
        self.counters.snapshot(state.elements.len(), entry_syncs)
    }

    /// Reload the full membership from the source.
    pub async fn sync(&self) -> StorageResult<()> {
        let _flight = self.membership_gate.lock().await;
        self.reload_membership().await
    }

    /// Look up one element.
    ///
    /// Reloads membership first if the collection has expired, then refreshes
    /// the element itself if it has expired. Returns `None` if no element
    /// exists for `key` after those refreshes.
    pub async fn get_element(&self, key: &S::Key) -> StorageResult<Option<S::Value>> {
        if self.is_expired() {
            let _flight = self.membership_gate.lock().await;
            if self.is_expired() {
                self.reload_membership().await?;
            }
        }

        let entry = self.read_state().elements.get(key).cloned();
        let Some(entry) = entry else {
            self.counters.miss();
            tracing::trace!(?key, "Cache collection has no element");
            return Ok(None);
        };

        if entry.is_expired() {
            self.counters.miss();
        } else {
            self.counters.hit();
        }
        entry.get().await
    }

    /// Write through a value that was just persisted.
    pub fn insert(&self, key: S::Key, value: S::Value) {
        let mut state = self.write_state();
        state.generation += 1;
        let generation = state.generation;
        state.written.insert(key.clone(), generation);
        if let Some(entry) = state.elements.get(&key) {
            entry.set(Some(value));
            return;
        }

        let entry = CacheEntry::with_value(
            key.clone(),
            self.entry_ttl,
            Arc::clone(&self.source),
            Some(value),
        );
        state.elements.insert(key, Arc::new(entry));
    }

    /// Force the next lookup to reload membership.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.generation += 1;
        state.invalidated_at = state.generation;
        state.last_synced_at = None;
    }

    /// Force the next lookup of `key` to resync that element.
    pub fn invalidate_element(&self, key: &S::Key) {
        if let Some(entry) = self.read_state().elements.get(key) {
            entry.invalidate();
        }
    }

    async fn reload_membership(&self) -> StorageResult<()> {
        let started_at = self.read_state().generation;
        let rows = match self.source.fetch_all().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Cache collection membership sync failed");
                return Err(e);
            }
        };

        let mut elements: HashMap<S::Key, Arc<CacheEntry<S>>> = rows
            .into_iter()
            .map(|(key, value)| {
                let entry = CacheEntry::with_value(
                    key.clone(),
                    self.entry_ttl,
                    Arc::clone(&self.source),
                    Some(value),
                );
                (key, Arc::new(entry))
            })
            .collect();

        let mut guard = self.write_state();
        let state = &mut *guard;
        // Keys written after the fetch began keep their written entry.
        for (key, _) in state.written.iter().filter(|(_, g)| **g > started_at) {
            if let Some(entry) = state.elements.get(key) {
                elements.insert(key.clone(), Arc::clone(entry));
            }
        }
        state.written.retain(|_, g| *g > started_at);
        state.elements = elements;

        let count = state.elements.len();
        if state.invalidated_at > started_at {
            tracing::debug!(count, "Cache collection invalidated during sync; staying expired");
        } else {
            state.last_synced_at = Some(Instant::now());
        }
        self.counters.membership_synced();
        tracing::debug!(count, "Cache collection membership synced");
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CollectionState<S>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CollectionState<S>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
