//! Tool configuration.

use crate::error::{ResearchError, Result};
use crate::registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use verity_xbrl::RuleSet;

/// Default number of search results.
pub const DEFAULT_TOP_K: usize = 10;

/// Default cap on filing content returned by fetch, in characters.
pub const DEFAULT_CONTENT_LIMIT: usize = 50_000;

/// Configuration of the research tools, loaded from JSON.
///
/// Every field is optional in the file.
///
/// ```json
/// {
///   "default_top_k": 10,
///   "content_limit": 50000,
///   "filed_within_days": 90,
///   "registry": { "max_entries": 100000 },
///   "rules_path": "rules/custom.json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Results returned by search when the caller does not say
    pub default_top_k: usize,

    /// Characters of filing content returned by fetch
    pub content_limit: usize,

    /// Default search window on filing date; no window when absent
    pub filed_within_days: Option<u32>,

    /// Handle registry settings
    pub registry: RegistryConfig,

    /// Match rule file; the embedded standard rules when absent
    pub rules_path: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            content_limit: DEFAULT_CONTENT_LIMIT,
            filed_within_days: None,
            registry: RegistryConfig::default(),
            rules_path: None,
        }
    }
}

impl ToolsConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// A relative `rules_path` is resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_json(&std::fs::read_to_string(path)?)?;
        if let Some(rules) = config.rules_path.take() {
            config.rules_path = Some(match path.parent() {
                Some(dir) if rules.is_relative() => dir.join(rules),
                _ => rules,
            });
        }
        Ok(config)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.default_top_k == 0 {
            return Err(ResearchError::Config(
                "default_top_k must be at least 1".to_string(),
            ));
        }
        if self.content_limit == 0 {
            return Err(ResearchError::Config(
                "content_limit must be at least 1".to_string(),
            ));
        }
        if self.registry.max_entries == Some(0) {
            return Err(ResearchError::Config(
                "registry.max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the configured match rules.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let rules = match &self.rules_path {
            Some(path) => RuleSet::from_path(path)?,
            None => RuleSet::standard()?,
        };
        Ok(rules)
    }
}
