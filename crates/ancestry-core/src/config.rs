//! `EngineConfig`: a typed configuration surface over the §6.2
//! `getSetting`/`setSetting` key-value contract, implementing
//! [`ancestry_foundation::Config`].
//!
//! Covers which sources are enabled, per-source base URL / rate limit /
//! retry budget, and the default generations cap — loadable from a JSON
//! file or environment.

use ancestry_foundation::{Config, FoundationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-source runtime settings (§5 "per-source rate limits are enforced
/// inside adapters"; §6.2 credential plumbing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    /// Requests per second this source's rate limiter permits.
    pub rate_limit_per_sec: f64,
    /// Maximum retry attempts for a transient failure (§7).
    pub retry_budget: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            rate_limit_per_sec: 2.0,
            retry_budget: 3,
        }
    }
}

/// Engine-wide configuration (SPEC_FULL ambient §4 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on requested generations, G (§9 open question: "we
    /// specify G ≤ 7").
    pub max_generations: u8,
    /// Per-source settings, keyed by [`crate::sources::SourceAdapter::name`].
    pub sources: HashMap<String, SourceConfig>,
    /// Age heuristic used by BFS expansion's year estimation (§4.9 Phase 3).
    pub father_age_heuristic: u32,
    pub mother_age_heuristic: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_generations: 7,
            sources: HashMap::new(),
            father_age_heuristic: 28,
            mother_age_heuristic: 25,
        }
    }
}

impl EngineConfig {
    /// Parse config from a JSON document (file contents or inline literal).
    pub fn from_json(contents: &str) -> ancestry_foundation::Result<Self> {
        serde_json::from_str(contents).map_err(FoundationError::from)
    }

    /// Load from a JSON file on disk, validating on the way in.
    pub fn load(path: impl AsRef<std::path::Path>) -> ancestry_foundation::Result<Self> {
        ancestry_foundation::io::load_config_from_file(path)
    }

    pub fn source(&self, name: &str) -> SourceConfig {
        self.sources.get(name).cloned().unwrap_or_default()
    }
}

impl Config for EngineConfig {
    fn validate(&self) -> ancestry_foundation::Result<()> {
        if self.max_generations == 0 || self.max_generations > 7 {
            return Err(FoundationError::InvalidInput(format!(
                "max_generations must be in [1, 7], got {}",
                self.max_generations
            )));
        }
        for (name, source) in &self.sources {
            if source.rate_limit_per_sec <= 0.0 {
                return Err(FoundationError::InvalidInput(format!(
                    "source {name} has non-positive rate_limit_per_sec"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_generations_above_seven() {
        let mut config = EngineConfig::default();
        config.max_generations = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = EngineConfig::default();
        config.sources.insert(
            "civil-index".to_string(),
            SourceConfig {
                enabled: true,
                base_url: Some("https://civil.example/api".into()),
                rate_limit_per_sec: 5.0,
                retry_budget: 4,
            },
        );
        let json = serde_json::to_string(&config).unwrap();
        let reloaded = EngineConfig::from_json(&json).unwrap();
        assert_eq!(reloaded.source("civil-index").retry_budget, 4);
    }
}
