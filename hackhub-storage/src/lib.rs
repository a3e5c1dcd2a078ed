//! Hackathon Hub Storage - Persistence Gateway and TTL Caches
//!
//! Defines the record-level persistence abstraction the hub talks to, an
//! in-memory implementation used in development and tests, a deadline
//! wrapper for any gateway, and the TTL caches that sit in front of it.

pub mod cache;
pub mod gateway;
pub mod memory;
pub mod timed;

pub use cache::{
    CacheCollection, CacheEntry, CacheStats, CatalogueCache, CollectionSource, EntrySource,
};
pub use gateway::{Document, PersistenceGateway, Record, RecordKey};
pub use memory::InMemoryGateway;
pub use timed::TimedGateway;
