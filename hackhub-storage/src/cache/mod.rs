//! TTL caches in front of the persistence gateway.
//!
//! Three shapes are provided:
//!
//! - [`CacheEntry`]: one value with a TTL, refreshed from an [`EntrySource`].
//! - [`CacheCollection`]: keyed entries with a membership TTL on top of the
//!   per-entry TTL, refreshed from a [`CollectionSource`].
//! - [`CatalogueCache`]: a whole list under one TTL, repopulated by a loader.
//!
//! Every cache refreshes at most once per expiry window: concurrent readers
//! of an expired value wait for the in-flight refresh instead of starting
//! their own.

mod catalogue;
mod collection;
mod entry;
mod source;
mod stats;

pub use catalogue::CatalogueCache;
pub use collection::CacheCollection;
pub use entry::CacheEntry;
pub use source::{CollectionSource, EntrySource};
pub use stats::CacheStats;
