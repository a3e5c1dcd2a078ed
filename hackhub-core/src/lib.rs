//! Hackathon Hub Core - Shared Types
//!
//! Identifiers, time-to-live semantics, the error taxonomy and configuration
//! shared by the storage, cache and achievement crates. No I/O lives here.

pub mod config;
pub mod error;
pub mod identity;

pub use config::{
    CacheSettings, HubConfig, DEFAULT_CATALOGUE_TTL_MS, DEFAULT_GATEWAY_TIMEOUT_MS,
    DEFAULT_PROGRESS_COLLECTION_TTL_MS, DEFAULT_PROGRESS_ENTRY_TTL_MS,
};
pub use error::{
    ConfigError, ConflictError, HubError, HubResult, NotFoundError, StorageError, StorageResult,
    ValidationError,
};
pub use identity::{AchievementId, RowId, UserId};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds, as carried in configuration.
pub type DurationMs = i64;

// ============================================================================
// TIME-TO-LIVE
// ============================================================================

/// Time-to-live of a cached value.
///
/// Serialized as milliseconds; any negative value means the value never
/// expires once synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DurationMs", into = "DurationMs")]
pub enum Ttl {
    /// Never expires
    Never,
    /// Expires once strictly more than this much time has elapsed since the last sync
    After(Duration),
}

impl Ttl {
    /// Build a TTL from milliseconds, treating negative values as [`Ttl::Never`].
    pub fn from_millis(ms: DurationMs) -> Self {
        if ms < 0 {
            Self::Never
        } else {
            Self::After(Duration::from_millis(ms as u64))
        }
    }

    /// Milliseconds representation, `-1` for [`Ttl::Never`].
    pub fn as_millis(&self) -> DurationMs {
        match self {
            Self::Never => -1,
            Self::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// Whether a value synced `elapsed` ago is stale.
    pub fn is_elapsed(&self, elapsed: Duration) -> bool {
        match self {
            Self::Never => false,
            Self::After(ttl) => elapsed > *ttl,
        }
    }
}

impl From<DurationMs> for Ttl {
    fn from(ms: DurationMs) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Ttl> for DurationMs {
    fn from(ttl: Ttl) -> Self {
        ttl.as_millis()
    }
}
