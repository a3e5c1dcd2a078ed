//! Hackathon Hub Achievements
//!
//! Achievement catalogue, per-achievement token policies and the progress
//! engine that advances users through achievements on top of the cached
//! persistence layer.

pub mod catalogue;
pub mod definition;
pub mod engine;
pub mod locks;
pub mod progress;
pub mod provider;
pub mod token;

pub use catalogue::AchievementCatalogue;
pub use definition::{AchievementDefinition, AchievementOptions};
pub use engine::{AchievementOverview, AchievementProgressEngine, ProgressStatus, ProgressUpdate};
pub use locks::KeyedLocks;
pub use progress::{ProgressKey, ProgressRecord, ProgressSource, PROGRESS_COLLECTION};
pub use provider::{
    AchievementsProvider, LocalAchievementsStore, PersistedAchievementsStore,
    ACHIEVEMENTS_COLLECTION,
};
pub use token::TokenPolicy;
