//! Engine configuration
//!
//! Loaded from TOML or YAML (chosen by file extension) or built in code:
//!
//! ```toml
//! [submission]
//! sort_orders = [5]
//! name_patterns = ["submit to carriers"]
//!
//! [synthesis]
//! subject_template = "Submission for {recipient}"
//!
//! [propagation]
//! max_visits = 500
//!
//! [cache]
//! capacity = 1024
//! ```

use crate::error::ConfigError;
use placement_graph::SubmissionRules;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default subject when a block supplies none
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "Submission for {recipient}";

/// Submission synthesis settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Subject template; `{recipient}` and `{task}` are substituted
    pub subject_template: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
        }
    }
}

impl SynthesisConfig {
    /// Render the subject for `recipient` of task `task_name`
    #[must_use]
    pub fn render_subject(&self, recipient: &str, task_name: &str) -> String {
        self.subject_template
            .replace("{recipient}", recipient)
            .replace("{task}", task_name)
    }
}

/// Propagation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Visit budget per run; defaults to the company's task count
    pub max_visits: Option<usize>,
}

/// Parse cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached parse results
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: placement_artifact::DEFAULT_CAPACITY,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which tasks are submission (email) tasks
    pub submission: SubmissionRules,
    /// Submission synthesis
    pub synthesis: SynthesisConfig,
    /// Status propagation
    pub propagation: PropagationConfig,
    /// Parse cache
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With submission allow-list
    #[inline]
    #[must_use]
    pub fn with_submission_rules(mut self, rules: SubmissionRules) -> Self {
        self.submission = rules;
        self
    }

    /// With subject template
    #[inline]
    #[must_use]
    pub fn with_subject_template(mut self, template: impl Into<String>) -> Self {
        self.synthesis.subject_template = template.into();
        self
    }

    /// With visit budget
    #[inline]
    #[must_use]
    pub fn with_max_visits(mut self, max_visits: usize) -> Self {
        self.propagation.max_visits = Some(max_visits);
        self
    }

    /// With parse cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// I/O, parse, unsupported extension, or validation failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&text)?,
            "yaml" | "yml" => Self::from_yaml_str(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        tracing::debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Invalid TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// Invalid YAML or invalid values.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize but cannot work
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.synthesis.subject_template.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "synthesis.subject_template must not be empty".into(),
            ));
        }
        if self.propagation.max_visits == Some(0) {
            return Err(ConfigError::Invalid(
                "propagation.max_visits must be positive".into(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.submission.sort_orders.is_empty());
        assert_eq!(config.synthesis.subject_template, DEFAULT_SUBJECT_TEMPLATE);
        assert_eq!(config.propagation.max_visits, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [submission]
            sort_orders = [5, 9]
            name_patterns = ["Submit"]
            "#,
        )
        .unwrap();
        assert_eq!(config.submission.sort_orders, vec![5, 9]);
        assert_eq!(config.synthesis.subject_template, DEFAULT_SUBJECT_TEMPLATE);
    }

    #[test]
    fn parses_yaml() {
        let config = EngineConfig::from_yaml_str(
            "synthesis:\n  subject_template: \"Quote request: {recipient}\"\npropagation:\n  max_visits: 10\n",
        )
        .unwrap();
        assert_eq!(config.propagation.max_visits, Some(10));
        assert_eq!(
            config.synthesis.render_subject("Acme", "Submit"),
            "Quote request: Acme"
        );
    }

    #[test]
    fn rejects_empty_template() {
        let err = EngineConfig::from_toml_str("[synthesis]\nsubject_template = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn builder_round_trip() {
        let config = EngineConfig::new()
            .with_submission_rules(SubmissionRules::new().with_sort_order(4))
            .with_subject_template("{task} / {recipient}")
            .with_max_visits(3)
            .with_cache_capacity(8);
        assert_eq!(config.synthesis.render_subject("Acme", "Send"), "Send / Acme");
        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.propagation.max_visits, Some(3));
    }
}
