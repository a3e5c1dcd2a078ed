//! Persisted achievement progress and its cache source.

use async_trait::async_trait;
use hackhub_core::{AchievementId, StorageResult, UserId};
use hackhub_storage::{CollectionSource, EntrySource, PersistenceGateway, Record, RecordKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Collection holding one progress row per (achievement, user).
pub const PROGRESS_COLLECTION: &str = "achievement_progress";

/// Identifies one user's progress on one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
}

impl ProgressKey {
    pub fn new(user_id: UserId, achievement_id: AchievementId) -> Self {
        Self {
            user_id,
            achievement_id,
        }
    }

    /// Persisted row id: `"{achievement_id}:{user_id}"`.
    pub fn record_id(&self) -> String {
        format!("{}:{}", self.achievement_id, self.user_id)
    }

    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(PROGRESS_COLLECTION, self.record_id())
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.record_id())
    }
}

/// Persisted progress row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub achievement_id: AchievementId,
    pub user_id: UserId,
    pub progress: u32,
}

impl ProgressRecord {
    /// The row created by a user's first increment.
    pub fn first(key: &ProgressKey) -> Self {
        Self {
            achievement_id: key.achievement_id.clone(),
            user_id: key.user_id,
            progress: 1,
        }
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(self.user_id, self.achievement_id.clone())
    }
}

/// Reads progress rows through the persistence gateway.
pub struct ProgressSource<G> {
    gateway: Arc<G>,
}

impl<G> ProgressSource<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl<G: PersistenceGateway + 'static> EntrySource for ProgressSource<G> {
    type Key = ProgressKey;
    type Value = ProgressRecord;

    async fn fetch_one(&self, key: &ProgressKey) -> StorageResult<Option<ProgressRecord>> {
        match self.gateway.read_one(&key.record_key()).await? {
            Some(record) => record.decode().map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<G: PersistenceGateway + 'static> CollectionSource for ProgressSource<G> {
    async fn fetch_all(&self) -> StorageResult<Vec<(ProgressKey, ProgressRecord)>> {
        self.gateway
            .read_all(PROGRESS_COLLECTION)
            .await?
            .iter()
            .map(|record: &Record| {
                let progress: ProgressRecord = record.decode()?;
                Ok((progress.key(), progress))
            })
            .collect()
    }
}
