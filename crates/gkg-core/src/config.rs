//! GKG configuration
//!
//! Loaded from TOML; every field has a default so a partial file works.
//!
//! ```toml
//! [engine]
//! max_rounds = 12
//!
//! [oracle]
//! base_url = "http://localhost:8000/v1"
//! model = "qwen2.5-7b-instruct"
//! ```

use crate::error::CoreError;
use crate::retry::RetryPolicy;
use gkg_oracle::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment override for the round ceiling
pub const MAX_ROUNDS_ENV: &str = "GKG_MAX_ROUNDS";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GkgConfig {
    pub engine: EngineConfig,
    pub retry: RetryPolicy,
    pub oracle: LlmConfig,
    pub graph: GraphConfig,
}

/// Narrowing loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Round ceiling per item
    pub max_rounds: u32,
    /// Items stepped concurrently within a round
    pub max_concurrent_items: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 16,
            max_concurrent_items: 4,
        }
    }
}

/// Taxonomy source and caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Taxonomy document (JSON or YAML)
    pub taxonomy_path: Option<PathBuf>,
    /// Entries per query cache
    pub cache_capacity: u64,
    /// Cache entry lifetime, unbounded when absent
    pub cache_ttl_secs: Option<u64>,
    /// Rounds added to the taxonomy depth when deriving a ceiling
    pub depth_margin: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: None,
            cache_capacity: 10_000,
            cache_ttl_secs: None,
            depth_margin: 2,
        }
    }
}

impl GkgConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML and validate
    pub fn from_toml_str(input: &str) -> Result<Self, CoreError> {
        let config: Self =
            toml::from_str(input).map_err(|e| CoreError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, apply environment overrides, validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GKG_MAX_ROUNDS` if set
    pub fn apply_env(&mut self) -> Result<(), CoreError> {
        if let Ok(raw) = std::env::var(MAX_ROUNDS_ENV) {
            self.engine.max_rounds = raw
                .trim()
                .parse()
                .map_err(|_| CoreError::Config(format!("{MAX_ROUNDS_ENV} must be an integer, got {raw:?}")))?;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.engine.max_rounds == 0 {
            return Err(CoreError::Config("engine.max_rounds must be at least 1".to_string()));
        }
        if self.engine.max_concurrent_items == 0 {
            return Err(CoreError::Config(
                "engine.max_concurrent_items must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// With round ceiling
    #[inline]
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.engine.max_rounds = max_rounds;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Round ceiling derived from taxonomy depth
    #[must_use]
    pub fn ceiling_for_depth(&self, depth: usize) -> u32 {
        u32::try_from(depth)
            .unwrap_or(u32::MAX)
            .saturating_add(self.graph.depth_margin)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = GkgConfig::from_toml_str(
            r#"
            [engine]
            max_rounds = 8

            [oracle]
            model = "local-model"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.max_rounds, 8);
        assert_eq!(config.engine.max_concurrent_items, 4);
        assert_eq!(config.oracle.model, "local-model");
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = GkgConfig::from_toml_str("[engine]\nmax_concurrent_items = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(msg) if msg.contains("max_concurrent_items")));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gkg.toml");
        std::fs::write(&path, "[graph]\ntaxonomy_path = \"taxonomy.yaml\"\ndepth_margin = 3\n").unwrap();

        let config = GkgConfig::load(&path).unwrap();
        assert_eq!(config.graph.taxonomy_path, Some(PathBuf::from("taxonomy.yaml")));
        assert_eq!(config.ceiling_for_depth(4), 7);
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            GkgConfig::load("/nonexistent/gkg.toml"),
            Err(CoreError::Config(_))
        ));
    }
}
