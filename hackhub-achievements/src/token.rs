//! Per-achievement token policies.
//!
//! A token gates progress on achievements that must not be self-reported,
//! e.g. attending a workshop. The core only validates tokens; issuing them
//! is left to whoever runs the step.

use hackhub_core::{AchievementId, ConfigError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How a supplied token is checked for one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenPolicy {
    /// Any supplied token is accepted.
    #[default]
    Any,

    /// The token must equal a fixed secret.
    SharedSecret { secret: String },

    /// The token is the hex HMAC-SHA256 of `"{achievement_id}:{step}"` keyed
    /// by `secret`. A step is always required and, if `steps` is set, must
    /// be one of them.
    SignedStep {
        secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steps: Option<Vec<String>>,
    },
}

impl TokenPolicy {
    /// Whether `token` is valid for `achievement`, optionally bound to `step`.
    pub fn accepts(&self, achievement: &AchievementId, token: &str, step: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::SharedSecret { secret } => token == secret.as_str(),
            Self::SignedStep { secret, steps } => {
                let Some(step) = step else {
                    return false;
                };
                if let Some(steps) = steps {
                    if !steps.iter().any(|s| s == step) {
                        return false;
                    }
                }
                verify_step_signature(secret, achievement, step, token)
            }
        }
    }

    /// Reject policies that could never accept a token.
    pub fn validate(&self, achievement: &AchievementId) -> Result<(), ConfigError> {
        let secret = match self {
            Self::Any => return Ok(()),
            Self::SharedSecret { secret } | Self::SignedStep { secret, .. } => secret,
        };
        if secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("achievement.{}.token.secret", achievement),
                value: String::new(),
                reason: "secret must not be empty".to_string(),
            });
        }
        if let Self::SignedStep {
            steps: Some(steps), ..
        } = self
        {
            if steps.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("achievement.{}.token.steps", achievement),
                    value: "[]".to_string(),
                    reason: "omit steps to accept any step".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn verify_step_signature(secret: &str, achievement: &AchievementId, step: &str, token: &str) -> bool {
    let Ok(expected) = hex::decode(token) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(achievement.as_str().as_bytes());
    mac.update(b":");
    mac.update(step.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
