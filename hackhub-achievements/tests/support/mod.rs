#![allow(dead_code)]

use std::sync::Arc;

use hackhub_achievements::{
    AchievementOptions, AchievementProgressEngine, AchievementsProvider, LocalAchievementsStore,
    ProgressKey, ProgressRecord, TokenPolicy,
};
use hackhub_core::{AchievementId, CacheSettings, UserId};
use hackhub_storage::{PersistenceGateway, Record};

pub const WORKSHOP_SECRET: &str = "workshop-signing-key";
pub const DESK_SECRET: &str = "help-desk";

pub fn achievement(id: &str, max_progress: u32) -> AchievementOptions {
    AchievementOptions {
        id: Some(AchievementId::new(id)),
        title: format!("Achievement {}", id),
        description: String::new(),
        prizes: "Sticker".to_string(),
        finish_message: "Congratulations!".to_string(),
        max_progress,
        requires_token: false,
        token: TokenPolicy::Any,
    }
}

/// A small catalogue covering each token policy:
/// - `open`: no token, max 3
/// - `desk`: shared secret required, max 2
/// - `workshops`: signed step required, max 3, steps rust/go/zig
/// - `single`: no token, max 1
pub fn test_catalogue() -> Vec<AchievementOptions> {
    vec![
        achievement("open", 3),
        AchievementOptions {
            requires_token: true,
            token: TokenPolicy::SharedSecret {
                secret: DESK_SECRET.to_string(),
            },
            ..achievement("desk", 2)
        },
        AchievementOptions {
            requires_token: true,
            token: TokenPolicy::SignedStep {
                secret: WORKSHOP_SECRET.to_string(),
                steps: Some(vec!["rust".to_string(), "go".to_string(), "zig".to_string()]),
            },
            ..achievement("workshops", 3)
        },
        achievement("single", 1),
    ]
}

pub fn test_provider() -> Arc<dyn AchievementsProvider> {
    Arc::new(LocalAchievementsStore::new(test_catalogue()).expect("Test catalogue is valid"))
}

pub fn test_engine<G: PersistenceGateway + 'static>(gateway: Arc<G>) -> AchievementProgressEngine<G> {
    AchievementProgressEngine::new(gateway, test_provider(), &CacheSettings::default())
}

/// Write a progress row directly, as another process would.
pub async fn seed_progress<G: PersistenceGateway>(
    gateway: &G,
    user: UserId,
    achievement: &str,
    progress: u32,
) {
    let key = ProgressKey::new(user, AchievementId::new(achievement));
    let record = ProgressRecord {
        progress,
        ..ProgressRecord::first(&key)
    };
    gateway
        .insert(Record::encode(key.record_key(), &record).expect("Progress encodes"))
        .await
        .expect("Failed to seed progress row");
}
