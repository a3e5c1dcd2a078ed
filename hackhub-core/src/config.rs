//! Hub core configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults, or from a TOML document. Either way it must pass
//! [`HubConfig::validate`] before use.

use crate::{ConfigError, Ttl};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default freshness of a single progress entry (10 seconds).
pub const DEFAULT_PROGRESS_ENTRY_TTL_MS: i64 = 10_000;

/// Default freshness of progress collection membership (1 minute).
pub const DEFAULT_PROGRESS_COLLECTION_TTL_MS: i64 = 60_000;

/// Default freshness of read-mostly catalogues (5 minutes).
pub const DEFAULT_CATALOGUE_TTL_MS: i64 = 300_000;

/// Default deadline for every persistence gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 5_000;

/// Cache time-to-live settings. Negative millisecond values never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(rename = "progress_collection_ttl_ms")]
    pub progress_collection_ttl: Ttl,

    #[serde(rename = "progress_entry_ttl_ms")]
    pub progress_entry_ttl: Ttl,

    #[serde(rename = "catalogue_ttl_ms")]
    pub catalogue_ttl: Ttl,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            progress_collection_ttl: Ttl::from_millis(DEFAULT_PROGRESS_COLLECTION_TTL_MS),
            progress_entry_ttl: Ttl::from_millis(DEFAULT_PROGRESS_ENTRY_TTL_MS),
            catalogue_ttl: Ttl::from_millis(DEFAULT_CATALOGUE_TTL_MS),
        }
    }
}

/// Top-level configuration for the hub core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub cache: CacheSettings,

    /// Deadline for every persistence gateway call, in milliseconds.
    pub gateway_timeout_ms: u64,

    /// Path to the TOML achievement catalogue, if loaded from disk.
    pub achievements_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            gateway_timeout_ms: DEFAULT_GATEWAY_TIMEOUT_MS,
            achievements_path: None,
        }
    }
}

impl HubConfig {
    /// Create HubConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HACKHUB_PROGRESS_COLLECTION_TTL_MS` (default: 60000, negative = never expire)
    /// - `HACKHUB_PROGRESS_ENTRY_TTL_MS` (default: 10000)
    /// - `HACKHUB_CATALOGUE_TTL_MS` (default: 300000)
    /// - `HACKHUB_GATEWAY_TIMEOUT_MS` (default: 5000)
    /// - `HACKHUB_ACHIEVEMENTS_PATH` (default: unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ttl = |name: &str, default: Ttl| -> Result<Ttl, ConfigError> {
            match lookup(name) {
                Some(raw) => parse_number::<i64>(name, &raw).map(Ttl::from_millis),
                None => Ok(default),
            }
        };

        let cache = CacheSettings {
            progress_collection_ttl: ttl(
                "HACKHUB_PROGRESS_COLLECTION_TTL_MS",
                defaults.cache.progress_collection_ttl,
            )?,
            progress_entry_ttl: ttl(
                "HACKHUB_PROGRESS_ENTRY_TTL_MS",
                defaults.cache.progress_entry_ttl,
            )?,
            catalogue_ttl: ttl("HACKHUB_CATALOGUE_TTL_MS", defaults.cache.catalogue_ttl)?,
        };

        let gateway_timeout_ms = match lookup("HACKHUB_GATEWAY_TIMEOUT_MS") {
            Some(raw) => parse_number::<u64>("HACKHUB_GATEWAY_TIMEOUT_MS", &raw)?,
            None => defaults.gateway_timeout_ms,
        };

        let achievements_path = lookup("HACKHUB_ACHIEVEMENTS_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self {
            cache,
            gateway_timeout_ms,
            achievements_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            source_name: "hub configuration".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gateway_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "every gateway call needs a non-zero deadline".to_string(),
            });
        }
        Ok(())
    }

    /// Deadline applied to every gateway call.
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "expected an integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = HubConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, HubConfig::default());
        assert_eq!(config.gateway_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.cache.progress_entry_ttl,
            Ttl::After(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = HubConfig::from_lookup(lookup_from(&[
            ("HACKHUB_PROGRESS_ENTRY_TTL_MS", "-1"),
            ("HACKHUB_GATEWAY_TIMEOUT_MS", "250"),
            ("HACKHUB_ACHIEVEMENTS_PATH", "config/achievements.toml"),
        ]))
        .unwrap();

        assert_eq!(config.cache.progress_entry_ttl, Ttl::Never);
        assert_eq!(config.gateway_timeout_ms, 250);
        assert_eq!(
            config.achievements_path,
            Some(PathBuf::from("config/achievements.toml"))
        );
    }

    #[test]
    fn test_env_invalid_number() {
        let err = HubConfig::from_lookup(lookup_from(&[("HACKHUB_CATALOGUE_TTL_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "HACKHUB_CATALOGUE_TTL_MS"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err =
            HubConfig::from_lookup(lookup_from(&[("HACKHUB_GATEWAY_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_toml() {
        let config = HubConfig::from_toml_str(
            r#"
            gateway_timeout_ms = 1500

            [cache]
            progress_entry_ttl_ms = 2000
            catalogue_ttl_ms = -1
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway_timeout_ms, 1500);
        assert_eq!(
            config.cache.progress_entry_ttl,
            Ttl::After(Duration::from_millis(2000))
        );
        assert_eq!(config.cache.catalogue_ttl, Ttl::Never);
        assert_eq!(
            config.cache.progress_collection_ttl,
            CacheSettings::default().progress_collection_ttl
        );
    }

    #[test]
    fn test_from_toml_malformed() {
        let err = HubConfig::from_toml_str("gateway_timeout_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
