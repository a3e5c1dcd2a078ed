//! Error types for hub core operations

use crate::{AchievementId, UserId};
use thiserror::Error;

/// Persistence layer errors.
///
/// Every failure of a `PersistenceGateway` call surfaces as one of these.
/// The cache layer propagates them unchanged; it never serves stale data
/// in place of a failed sync.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Record already exists: {collection}/{id}")]
    Conflict { collection: String, id: String },

    #[error("Persistence gateway unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Failed to decode {collection} record: {reason}")]
    Decode { collection: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

impl StorageError {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Request validation errors. The HTTP layer maps these to Forbidden.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Token required for achievement {achievement}")]
    MissingToken { achievement: AchievementId },

    #[error("Invalid token provided for achievement {achievement}")]
    InvalidToken {
        achievement: AchievementId,
        step: Option<String>,
    },
}

/// Lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Unknown achievement: {id}")]
    Achievement { id: AchievementId },

    #[error("No progress recorded for user {user} on achievement {achievement}")]
    Progress {
        user: UserId,
        achievement: AchievementId,
    },
}

/// Concurrent modification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Concurrent progress increment for user {user} on achievement {achievement}")]
    ConcurrentIncrement {
        user: UserId,
        achievement: AchievementId,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Duplicate achievement id in catalogue: {id}")]
    DuplicateAchievement { id: AchievementId },
}

/// Master error type for all hub core errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl HubError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Conflict(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for hub core operations.
pub type HubResult<T> = Result<T, HubError>;
