//! Achievement definitions.

use hackhub_core::{AchievementId, ConfigError, ValidationError};
use serde::{Deserialize, Serialize};

use crate::token::TokenPolicy;

/// One achievement as authored in the catalogue.
///
/// `id` is optional only for backwards compatibility with catalogues that
/// relied on load order; see [`AchievementCatalogue`](crate::AchievementCatalogue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AchievementId>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub prizes: String,

    #[serde(default, alias = "finish_message")]
    pub finish_message: String,

    #[serde(alias = "max_progress")]
    pub max_progress: u32,

    #[serde(default, alias = "requires_token")]
    pub requires_token: bool,

    #[serde(default)]
    pub token: TokenPolicy,
}

/// A loaded, validated achievement.
///
/// Immutable once built and shared as `Arc<AchievementDefinition>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub prizes: String,
    /// Shown to the user once progress reaches `max_progress`.
    pub finish_message: String,
    /// Always at least 1.
    pub max_progress: u32,
    pub requires_token: bool,
    pub token: TokenPolicy,
}

impl AchievementDefinition {
    /// Build a definition from catalogue options under the resolved `id`.
    pub fn from_options(id: AchievementId, options: AchievementOptions) -> Result<Self, ConfigError> {
        let definition = Self {
            id,
            title: options.title,
            description: options.description,
            prizes: options.prizes,
            finish_message: options.finish_message,
            max_progress: options.max_progress,
            requires_token: options.requires_token,
            token: options.token,
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_progress == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("achievement.{}.max_progress", self.id),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.token.validate(&self.id)
    }

    /// Whether a supplied token passes this achievement's policy.
    pub fn token_is_valid(&self, token: &str, step: Option<&str>) -> bool {
        self.token.accepts(&self.id, token, step)
    }

    /// Check whether a progress request may proceed.
    ///
    /// An empty token counts as no token.
    pub fn authorize(&self, token: Option<&str>, step: Option<&str>) -> Result<(), ValidationError> {
        match token.filter(|t| !t.is_empty()) {
            None if self.requires_token => Err(ValidationError::MissingToken {
                achievement: self.id.clone(),
            }),
            None => Ok(()),
            Some(token) if self.token_is_valid(token, step) => Ok(()),
            Some(_) => Err(ValidationError::InvalidToken {
                achievement: self.id.clone(),
                step: step.map(str::to_owned),
            }),
        }
    }

    pub fn is_complete(&self, progress: u32) -> bool {
        progress >= self.max_progress
    }
}
