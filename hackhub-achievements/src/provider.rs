//! Sources of achievement definitions.

use async_trait::async_trait;
use hackhub_core::{AchievementId, ConfigError, HubConfig, HubResult, StorageError, StorageResult, Ttl};
use hackhub_storage::{CatalogueCache, PersistenceGateway, Record};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalogue::AchievementCatalogue;
use crate::definition::{AchievementDefinition, AchievementOptions};

/// Collection holding persisted achievement definitions.
pub const ACHIEVEMENTS_COLLECTION: &str = "achievements";

/// Read-only access to the achievement catalogue.
#[async_trait]
pub trait AchievementsProvider: Send + Sync {
    /// Every achievement, in catalogue order.
    async fn get_achievements(&self) -> HubResult<Vec<Arc<AchievementDefinition>>>;

    /// The achievement with `id`, or `None` if the catalogue has none.
    async fn get_achievement_with_id(
        &self,
        id: &AchievementId,
    ) -> HubResult<Option<Arc<AchievementDefinition>>>;
}

// ============================================================================
// STATIC CATALOGUE
// ============================================================================

/// Achievements fixed at startup and held in memory for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct LocalAchievementsStore {
    achievements: Vec<Arc<AchievementDefinition>>,
    by_id: HashMap<AchievementId, usize>,
}

impl LocalAchievementsStore {
    pub fn new(options: Vec<AchievementOptions>) -> Result<Self, ConfigError> {
        Self::from_catalogue(AchievementCatalogue::new(options))
    }

    pub fn from_catalogue(catalogue: AchievementCatalogue) -> Result<Self, ConfigError> {
        let achievements: Vec<Arc<AchievementDefinition>> = catalogue
            .into_definitions()?
            .into_iter()
            .map(Arc::new)
            .collect();
        let by_id = achievements
            .iter()
            .enumerate()
            .map(|(index, a)| (a.id.clone(), index))
            .collect();

        tracing::info!(count = achievements.len(), "Achievement catalogue loaded");
        Ok(Self {
            achievements,
            by_id,
        })
    }

    /// Load the catalogue file named by `achievements_path`.
    pub fn from_config(config: &HubConfig) -> Result<Self, ConfigError> {
        let path = config
            .achievements_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "achievements_path".to_string(),
            })?;
        Self::from_catalogue(AchievementCatalogue::from_path(path)?)
    }

    pub fn len(&self) -> usize {
        self.achievements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
    }
}

#[async_trait]
impl AchievementsProvider for LocalAchievementsStore {
    async fn get_achievements(&self) -> HubResult<Vec<Arc<AchievementDefinition>>> {
        Ok(self.achievements.clone())
    }

    async fn get_achievement_with_id(
        &self,
        id: &AchievementId,
    ) -> HubResult<Option<Arc<AchievementDefinition>>> {
        Ok(self
            .by_id
            .get(id)
            .map(|&index| Arc::clone(&self.achievements[index])))
    }
}

// ============================================================================
// PERSISTED CATALOGUE
// ============================================================================

/// Achievements read from the gateway's `achievements` collection and
/// cached as a whole.
pub struct PersistedAchievementsStore<G> {
    gateway: Arc<G>,
    cache: CatalogueCache<Arc<AchievementDefinition>>,
}

impl<G: PersistenceGateway> PersistedAchievementsStore<G> {
    pub fn new(gateway: Arc<G>, ttl: Ttl) -> Self {
        Self {
            gateway,
            cache: CatalogueCache::new(ACHIEVEMENTS_COLLECTION, ttl),
        }
    }

    /// Drop the cached catalogue so the next read reloads it.
    pub fn invalidate(&self) {
        self.cache.delete_all();
    }

    async fn load(&self) -> StorageResult<Vec<Arc<AchievementDefinition>>> {
        let records = self.gateway.read_all(ACHIEVEMENTS_COLLECTION).await?;
        let mut seen = HashSet::with_capacity(records.len());
        let mut definitions = Vec::with_capacity(records.len());
        for record in &records {
            let definition = decode_definition(record)?;
            if !seen.insert(definition.id.clone()) {
                return Err(StorageError::Decode {
                    collection: ACHIEVEMENTS_COLLECTION.to_string(),
                    reason: format!("duplicate achievement id '{}' ({})", definition.id, record.key.id),
                });
            }
            definitions.push(definition);
        }
        Ok(definitions)
    }
}

/// Decode a stored definition, falling back to the record id when the
/// document carries none.
fn decode_definition(record: &Record) -> StorageResult<Arc<AchievementDefinition>> {
    let mut options: AchievementOptions = record.decode()?;
    let id = options
        .id
        .take()
        .unwrap_or_else(|| AchievementId::new(record.key.id.clone()));
    AchievementDefinition::from_options(id, options)
        .map(Arc::new)
        .map_err(|e| StorageError::Decode {
            collection: record.key.collection.clone(),
            reason: format!("{} ({})", e, record.key.id),
        })
}

#[async_trait]
impl<G: PersistenceGateway> AchievementsProvider for PersistedAchievementsStore<G> {
    async fn get_achievements(&self) -> HubResult<Vec<Arc<AchievementDefinition>>> {
        Ok(self.cache.get_or_load(|| self.load()).await?)
    }

    async fn get_achievement_with_id(
        &self,
        id: &AchievementId,
    ) -> HubResult<Option<Arc<AchievementDefinition>>> {
        Ok(self
            .get_achievements()
            .await?
            .into_iter()
            .find(|a| &a.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenPolicy;
    use hackhub_core::HubError;
    use hackhub_storage::{InMemoryGateway, RecordKey};
    use serde_json::json;

    fn option(id: Option<&str>, title: &str) -> AchievementOptions {
        AchievementOptions {
            id: id.map(AchievementId::from),
            title: title.to_string(),
            description: String::new(),
            prizes: String::new(),
            finish_message: String::new(),
            max_progress: 1,
            requires_token: false,
            token: TokenPolicy::Any,
        }
    }

    async fn seed(gateway: &InMemoryGateway, id: &str, document: serde_json::Value) {
        let serde_json::Value::Object(document) = document else {
            panic!("seed documents must be objects");
        };
        gateway
            .insert(Record::new(RecordKey::new(ACHIEVEMENTS_COLLECTION, id), document))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_local_store_lookup() {
        let store = LocalAchievementsStore::new(vec![
            option(Some("early-bird"), "Early bird"),
            option(None, "Second"),
        ])
        .unwrap();

        assert_eq!(store.len(), 2);
        let all = store.get_achievements().await.unwrap();
        assert_eq!(all[1].id.as_str(), "1");

        let found = store
            .get_achievement_with_id(&"early-bird".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Early bird");
        assert!(store
            .get_achievement_with_id(&"missing".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_local_store_results_are_stable() {
        let store = LocalAchievementsStore::new(vec![option(Some("a"), "A")]).unwrap();
        let first = store.get_achievements().await.unwrap();
        let second = store.get_achievements().await.unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn test_local_store_from_config_requires_path() {
        let err = LocalAchievementsStore::from_config(&HubConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "achievements_path".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_store_reads_through_cache() {
        let gateway = Arc::new(InMemoryGateway::new());
        seed(&gateway, "hacker", json!({"title": "Hacker", "maxProgress": 2})).await;
        seed(
            &gateway,
            "x",
            json!({"id": "explicit", "title": "Explicit", "maxProgress": 1}),
        )
        .await;

        let store = PersistedAchievementsStore::new(Arc::clone(&gateway), Ttl::from_millis(1000));
        let all = store.get_achievements().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["hacker", "explicit"]);

        // Cached: new rows stay invisible until the TTL lapses.
        seed(&gateway, "late", json!({"title": "Late", "maxProgress": 1})).await;
        assert_eq!(store.get_achievements().await.unwrap().len(), 2);
        assert!(store
            .get_achievement_with_id(&"late".into())
            .await
            .unwrap()
            .is_none());

        tokio::time::advance(std::time::Duration::from_millis(1001)).await;
        assert!(store
            .get_achievement_with_id(&"late".into())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_persisted_store_invalidate() {
        let gateway = Arc::new(InMemoryGateway::new());
        seed(&gateway, "a", json!({"title": "A", "maxProgress": 1})).await;
        let store = PersistedAchievementsStore::new(Arc::clone(&gateway), Ttl::Never);
        assert_eq!(store.get_achievements().await.unwrap().len(), 1);

        seed(&gateway, "b", json!({"title": "B", "maxProgress": 1})).await;
        store.invalidate();
        assert_eq!(store.get_achievements().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persisted_store_rejects_invalid_rows() {
        let gateway = Arc::new(InMemoryGateway::new());
        seed(&gateway, "zero", json!({"title": "Zero", "maxProgress": 0})).await;
        let store = PersistedAchievementsStore::new(gateway, Ttl::Never);

        let err = store.get_achievements().await.unwrap_err();
        assert!(matches!(err, HubError::Storage(StorageError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_persisted_store_rejects_duplicate_ids() {
        let gateway = Arc::new(InMemoryGateway::new());
        seed(&gateway, "first", json!({"id": "hacker", "title": "Hacker", "maxProgress": 1})).await;
        // Falls back to its record id, which collides with the explicit id above.
        seed(&gateway, "hacker", json!({"title": "Other hacker", "maxProgress": 2})).await;
        let store = PersistedAchievementsStore::new(gateway, Ttl::Never);

        let err = store
            .get_achievement_with_id(&"hacker".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Storage(StorageError::Decode { ref reason, .. }) if reason.contains("hacker")
        ));
    }
}
