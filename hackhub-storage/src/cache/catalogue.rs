//! Whole-collection cache for read-mostly catalogues.
//!
//! Locations, events and similar catalogues are read far more often than they
//! change and are always consumed as a whole, so they are cached as one value
//! with a single TTL and no per-element tracking.

use hackhub_core::{StorageResult, Ttl};
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::entry::is_stale;

#[derive(Debug)]
struct CatalogueState<T> {
    items: Vec<T>,
    last_synced_at: Option<Instant>,
}

/// Cache holding a whole catalogue under one TTL.
///
/// An empty result from [`get_all`](Self::get_all) means "repopulate from the
/// source of truth": the catalogue was never set, was deleted, or expired.
#[derive(Debug)]
pub struct CatalogueCache<T> {
    name: String,
    ttl: Ttl,
    state: RwLock<CatalogueState<T>>,
    /// Held by the one caller running the loader.
    load_gate: Mutex<()>,
}

impl<T: Clone> CatalogueCache<T> {
    pub fn new(name: impl Into<String>, ttl: Ttl) -> Self {
        Self {
            name: name.into(),
            ttl,
            state: RwLock::new(CatalogueState {
                items: Vec::new(),
                last_synced_at: None,
            }),
            load_gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_expired(&self) -> bool {
        is_stale(self.ttl, self.read_state().last_synced_at)
    }

    /// Cached items, or an empty list if the catalogue must be repopulated.
    pub fn get_all(&self) -> Vec<T> {
        let state = self.read_state();
        if is_stale(self.ttl, state.last_synced_at) {
            Vec::new()
        } else {
            state.items.clone()
        }
    }

    /// Replace the cached items and mark them fresh.
    pub fn set_all(&self, items: Vec<T>) {
        let mut state = self.write_state();
        state.items = items;
        state.last_synced_at = Some(Instant::now());
    }

    /// Drop the cached items so the next reader repopulates them.
    pub fn delete_all(&self) {
        let mut state = self.write_state();
        state.items.clear();
        state.last_synced_at = None;
    }

    /// Return the cached items, running `loader` once if they must be
    /// repopulated.
    ///
    /// Concurrent callers wait for a single in-flight load. An empty load
    /// result is returned but not cached.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> StorageResult<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<Vec<T>>>,
    {
        let cached = self.get_all();
        if !cached.is_empty() {
            return Ok(cached);
        }

        let _flight = self.load_gate.lock().await;
        let cached = self.get_all();
        if !cached.is_empty() {
            return Ok(cached);
        }

        let items = loader().await?;
        tracing::debug!(catalogue = %self.name, count = items.len(), "Catalogue loaded");
        if !items.is_empty() {
            self.set_all(items.clone());
        }
        Ok(items)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CatalogueState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CatalogueState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
