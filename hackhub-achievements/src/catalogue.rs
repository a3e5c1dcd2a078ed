//! Loading the static achievement catalogue from TOML.
//!
//! ```toml
//! [[achievement]]
//! id = "early-bird"
//! title = "Early bird"
//! max_progress = 1
//!
//! [[achievement]]
//! id = "workshops"
//! title = "Workshop hopper"
//! max_progress = 3
//! requires_token = true
//! token = { kind = "signed_step", secret = "change-me" }
//! ```

use hackhub_core::{AchievementId, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::definition::{AchievementDefinition, AchievementOptions};

/// The authored list of achievements, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementCatalogue {
    #[serde(default, rename = "achievement")]
    pub achievements: Vec<AchievementOptions>,
}

impl AchievementCatalogue {
    pub fn new(achievements: Vec<AchievementOptions>) -> Self {
        Self { achievements }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse {
            source_name: "achievement catalogue".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Resolve ids and validate every entry.
    ///
    /// Entries without an id get their load-order position. Duplicate ids,
    /// explicit or positional, are rejected.
    pub fn into_definitions(self) -> Result<Vec<AchievementDefinition>, ConfigError> {
        let mut seen = HashSet::with_capacity(self.achievements.len());
        let mut definitions = Vec::with_capacity(self.achievements.len());

        for (position, mut options) in self.achievements.into_iter().enumerate() {
            let id = match options.id.take() {
                Some(id) => id,
                None => {
                    let id = AchievementId::from_position(position);
                    tracing::warn!(
                        achievement = %id,
                        title = %options.title,
                        "Achievement has no explicit id; using its catalogue position"
                    );
                    id
                }
            };

            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateAchievement { id });
            }
            definitions.push(AchievementDefinition::from_options(id, options)?);
        }

        Ok(definitions)
    }
}
