//! Achievement progress engine.
//!
//! Keeps the progress cache and the persisted progress rows consistent while
//! users advance through achievements. Every increment for one (user,
//! achievement) pair runs under that pair's lock: the cached value is read,
//! the advanced value is persisted, and only then is the cache updated.

use hackhub_core::{
    AchievementId, CacheSettings, ConflictError, HubConfig, HubError, HubResult, NotFoundError,
    StorageError, UserId,
};
use hackhub_storage::{CacheCollection, CacheStats, Document, PersistenceGateway, Record, TimedGateway};
use serde::Serialize;
use std::sync::Arc;

use crate::definition::AchievementDefinition;
use crate::locks::KeyedLocks;
use crate::progress::{ProgressKey, ProgressRecord, ProgressSource};
use crate::provider::AchievementsProvider;

/// What an increment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Progress moved forward and is still below the maximum.
    Advanced,
    /// This increment reached the maximum.
    Completed,
    /// The maximum had already been reached; nothing was written.
    AlreadyCompleted,
}

/// Result of [`AchievementProgressEngine::increment_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub progress: u32,
    pub max_progress: u32,
    pub status: ProgressStatus,
}

impl ProgressUpdate {
    fn advanced(progress: u32, max_progress: u32) -> Self {
        let status = if progress >= max_progress {
            ProgressStatus::Completed
        } else {
            ProgressStatus::Advanced
        };
        Self {
            progress,
            max_progress,
            status,
        }
    }

    fn already_completed(max_progress: u32) -> Self {
        Self {
            progress: max_progress,
            max_progress,
            status: ProgressStatus::AlreadyCompleted,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.max_progress
    }
}

/// One achievement with a user's progress on it, for dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementOverview {
    pub achievement: Arc<AchievementDefinition>,
    pub progress: u32,
    pub completed: bool,
}

struct EngineInner<G: PersistenceGateway + 'static> {
    gateway: Arc<G>,
    provider: Arc<dyn AchievementsProvider>,
    progress: CacheCollection<ProgressSource<G>>,
    locks: KeyedLocks<ProgressKey>,
}

/// Tracks and advances user progress on achievements.
///
/// Cheap to clone; clones share the cache and lock registry.
pub struct AchievementProgressEngine<G: PersistenceGateway + 'static> {
    inner: Arc<EngineInner<G>>,
}

impl<G: PersistenceGateway + 'static> Clone for AchievementProgressEngine<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: PersistenceGateway + 'static> AchievementProgressEngine<TimedGateway<G>> {
    /// Build an engine whose gateway calls are bounded by the configured
    /// deadline.
    pub fn from_config(
        gateway: G,
        provider: Arc<dyn AchievementsProvider>,
        config: &HubConfig,
    ) -> HubResult<Self> {
        config.validate()?;
        let gateway = Arc::new(TimedGateway::new(gateway, config.gateway_timeout()));
        Ok(Self::new(gateway, provider, &config.cache))
    }
}

impl<G: PersistenceGateway + 'static> AchievementProgressEngine<G> {
    pub fn new(
        gateway: Arc<G>,
        provider: Arc<dyn AchievementsProvider>,
        cache: &CacheSettings,
    ) -> Self {
        let source = Arc::new(ProgressSource::new(Arc::clone(&gateway)));
        let progress = CacheCollection::new(
            source,
            cache.progress_collection_ttl,
            cache.progress_entry_ttl,
        );
        Self {
            inner: Arc::new(EngineInner {
                gateway,
                provider,
                progress,
                locks: KeyedLocks::new(),
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.inner.gateway
    }

    pub fn progress_cache_stats(&self) -> CacheStats {
        self.inner.progress.stats()
    }

    /// Advance `user` by one step on `achievement_id`.
    ///
    /// Fails with `NotFound` for an unknown achievement and with `Validation`
    /// when the token policy rejects the request; neither writes anything.
    /// Once the maximum is reached further calls report
    /// [`ProgressStatus::AlreadyCompleted`] without writing.
    ///
    /// The write runs to completion even if the returned future is dropped.
    pub async fn increment_progress(
        &self,
        user: &UserId,
        achievement_id: &AchievementId,
        token: Option<&str>,
        step: Option<&str>,
    ) -> HubResult<ProgressUpdate> {
        let definition = self.inner.definition(achievement_id).await?;
        if let Err(e) = definition.authorize(token, step) {
            tracing::warn!(user = %user, achievement = %achievement_id, error = %e, "Progress request rejected");
            return Err(e.into());
        }

        let inner = Arc::clone(&self.inner);
        let key = ProgressKey::new(*user, achievement_id.clone());
        let max_progress = definition.max_progress;
        tokio::spawn(async move { inner.advance(key, max_progress).await })
            .await
            .map_err(|e| {
                HubError::from(StorageError::TaskFailed {
                    reason: e.to_string(),
                })
            })?
    }

    /// Read `user`'s persisted progress, bypassing the cache.
    pub async fn check_progress(
        &self,
        user: &UserId,
        achievement_id: &AchievementId,
    ) -> HubResult<u32> {
        let key = ProgressKey::new(*user, achievement_id.clone());
        match self.inner.gateway.read_one(&key.record_key()).await? {
            Some(record) => Ok(record.decode::<ProgressRecord>()?.progress),
            None => Err(NotFoundError::Progress {
                user: *user,
                achievement: achievement_id.clone(),
            }
            .into()),
        }
    }

    /// Every achievement with `user`'s progress, zero where none is recorded.
    pub async fn user_overview(&self, user: &UserId) -> HubResult<Vec<AchievementOverview>> {
        let achievements = self.inner.provider.get_achievements().await?;
        let mut overview = Vec::with_capacity(achievements.len());
        for achievement in achievements {
            let key = ProgressKey::new(*user, achievement.id.clone());
            let progress = self
                .inner
                .progress
                .get_element(&key)
                .await?
                .map(|record| record.progress.min(achievement.max_progress))
                .unwrap_or(0);
            overview.push(AchievementOverview {
                completed: achievement.is_complete(progress),
                achievement,
                progress,
            });
        }
        Ok(overview)
    }
}

impl<G: PersistenceGateway + 'static> EngineInner<G> {
    async fn definition(&self, id: &AchievementId) -> HubResult<Arc<AchievementDefinition>> {
        self.provider
            .get_achievement_with_id(id)
            .await?
            .ok_or_else(|| NotFoundError::Achievement { id: id.clone() }.into())
    }

    async fn advance(&self, key: ProgressKey, max_progress: u32) -> HubResult<ProgressUpdate> {
        let _guard = self.locks.lock(&key).await;

        match self.progress.get_element(&key).await? {
            Some(record) if record.progress >= max_progress => {
                tracing::debug!(progress = %key, "Achievement already completed");
                Ok(ProgressUpdate::already_completed(max_progress))
            }
            Some(record) => {
                let progress = record.progress + 1;
                let mut fields = Document::new();
                fields.insert("progress".to_string(), progress.into());

                if let Err(e) = self.gateway.update(&key.record_key(), fields).await {
                    // The write may or may not have landed; resync before trusting the cache.
                    self.progress.invalidate_element(&key);
                    if matches!(e, StorageError::NotFound { .. }) {
                        self.progress.invalidate();
                    }
                    return Err(e.into());
                }

                self.progress
                    .insert(key.clone(), ProgressRecord { progress, ..record });
                tracing::info!(progress = %key, value = progress, max_progress, "Achievement progress advanced");
                Ok(ProgressUpdate::advanced(progress, max_progress))
            }
            None => {
                let record = ProgressRecord::first(&key);
                let row = Record::encode(key.record_key(), &record)?;

                match self.gateway.insert(row).await {
                    Ok(_) => {}
                    Err(StorageError::Conflict { .. }) => {
                        self.progress.invalidate();
                        tracing::warn!(progress = %key, "Progress row created concurrently elsewhere");
                        return Err(ConflictError::ConcurrentIncrement {
                            user: key.user_id,
                            achievement: key.achievement_id,
                        }
                        .into());
                    }
                    Err(e) => {
                        self.progress.invalidate();
                        return Err(e.into());
                    }
                }

                self.progress.insert(key.clone(), record);
                tracing::info!(progress = %key, value = 1, max_progress, "Achievement progress started");
                Ok(ProgressUpdate::advanced(1, max_progress))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AchievementOptions;
    use crate::provider::LocalAchievementsStore;
    use crate::token::TokenPolicy;
    use hackhub_core::{Ttl, ValidationError};
    use hackhub_storage::InMemoryGateway;

    fn catalogue() -> Arc<dyn AchievementsProvider> {
        let open = AchievementOptions {
            id: Some("open".into()),
            title: "Open".to_string(),
            description: String::new(),
            prizes: String::new(),
            finish_message: "Done".to_string(),
            max_progress: 3,
            requires_token: false,
            token: TokenPolicy::Any,
        };
        let gated = AchievementOptions {
            id: Some("gated".into()),
            title: "Gated".to_string(),
            max_progress: 2,
            requires_token: true,
            token: TokenPolicy::SharedSecret {
                secret: "pass".to_string(),
            },
            ..open.clone()
        };
        Arc::new(LocalAchievementsStore::new(vec![open, gated]).unwrap())
    }

    fn engine() -> AchievementProgressEngine<InMemoryGateway> {
        AchievementProgressEngine::new(
            Arc::new(InMemoryGateway::new()),
            catalogue(),
            &CacheSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_first_increment_creates_record() {
        let engine = engine();
        let user = UserId::now_v7();

        let update = engine
            .increment_progress(&user, &"open".into(), None, None)
            .await
            .unwrap();
        assert_eq!(update.progress, 1);
        assert_eq!(update.status, ProgressStatus::Advanced);
        assert_eq!(engine.check_progress(&user, &"open".into()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clamps_at_max_progress() {
        let engine = engine();
        let user = UserId::now_v7();
        let open: AchievementId = "open".into();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(
                engine
                    .increment_progress(&user, &open, None, None)
                    .await
                    .unwrap(),
            );
        }

        let progress: Vec<u32> = seen.iter().map(|u| u.progress).collect();
        assert_eq!(progress, vec![1, 2, 3, 3]);
        assert_eq!(seen[2].status, ProgressStatus::Completed);
        assert_eq!(seen[3].status, ProgressStatus::AlreadyCompleted);
        assert!(seen[3].is_complete());
        assert_eq!(engine.check_progress(&user, &open).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_achievement() {
        let err = engine()
            .increment_progress(&UserId::now_v7(), &"nope".into(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::NotFound(NotFoundError::Achievement { .. })
        ));
    }

    #[tokio::test]
    async fn test_token_rules() {
        let engine = engine();
        let user = UserId::now_v7();
        let gated: AchievementId = "gated".into();

        let missing = engine
            .increment_progress(&user, &gated, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            HubError::Validation(ValidationError::MissingToken { .. })
        ));

        let wrong = engine
            .increment_progress(&user, &gated, Some("guess"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            wrong,
            HubError::Validation(ValidationError::InvalidToken { .. })
        ));
        assert!(engine.gateway().is_empty("achievement_progress").unwrap());

        let ok = engine
            .increment_progress(&user, &gated, Some("pass"), None)
            .await
            .unwrap();
        assert_eq!(ok.progress, 1);
    }

    #[tokio::test]
    async fn test_check_progress_without_record() {
        let err = engine()
            .check_progress(&UserId::now_v7(), &"open".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::NotFound(NotFoundError::Progress { .. })
        ));
    }

    #[tokio::test]
    async fn test_user_overview() {
        let engine = engine();
        let user = UserId::now_v7();
        engine
            .increment_progress(&user, &"gated".into(), Some("pass"), None)
            .await
            .unwrap();
        engine
            .increment_progress(&user, &"gated".into(), Some("pass"), None)
            .await
            .unwrap();

        let overview = engine.user_overview(&user).await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].achievement.id.as_str(), "open");
        assert_eq!(overview[0].progress, 0);
        assert!(!overview[0].completed);
        assert_eq!(overview[1].progress, 2);
        assert!(overview[1].completed);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let config = HubConfig {
            gateway_timeout_ms: 0,
            ..HubConfig::default()
        };
        let result = AchievementProgressEngine::from_config(InMemoryGateway::new(), catalogue(), &config);
        assert!(matches!(result, Err(HubError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_config_wraps_gateway() {
        let engine =
            AchievementProgressEngine::from_config(InMemoryGateway::new(), catalogue(), &HubConfig::default())
                .unwrap();
        assert_eq!(
            engine.gateway().timeout(),
            std::time::Duration::from_millis(hackhub_core::DEFAULT_GATEWAY_TIMEOUT_MS)
        );
        let update = engine
            .increment_progress(&UserId::now_v7(), &"open".into(), None, None)
            .await
            .unwrap();
        assert_eq!(update.progress, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_cache_serves_repeat_increments() {
        let settings = CacheSettings {
            progress_collection_ttl: Ttl::Never,
            progress_entry_ttl: Ttl::Never,
            catalogue_ttl: Ttl::Never,
        };
        let engine = AchievementProgressEngine::new(
            Arc::new(InMemoryGateway::new()),
            catalogue(),
            &settings,
        );
        let user = UserId::now_v7();
        for _ in 0..3 {
            engine
                .increment_progress(&user, &"open".into(), None, None)
                .await
                .unwrap();
        }

        let stats = engine.progress_cache_stats();
        assert_eq!(stats.membership_syncs, 1);
        assert_eq!(stats.entry_syncs, 0);
        assert_eq!(stats.hits, 2);
    }
}
