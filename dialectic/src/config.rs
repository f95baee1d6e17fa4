//! Progression engine configuration.
//!
//! Defaults match a two-cycle saturation threshold and a two-test budget per
//! tension. Configuration can be built in code, parsed from TOML, or overlaid
//! from `DIALECTIC_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProgressionError, ProgressionResult};

/// Tunables for the progression controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Master switch. When false, `process_turn` is a no-op.
    pub enable_progression: bool,
    /// Consecutive non-entailing turns before a tension is saturated.
    pub cycles_threshold: u32,
    /// Consequence tests allowed per tension before a pivot is forced.
    pub max_consequence_tests: u32,
    /// Turns since the last pivot before a periodic synthesis (0 = never).
    pub synthesis_interval: u64,
    /// Strict mode: a test reply must lexically address the test to count.
    pub entailment_required: bool,
    /// Prior turns whose topics count towards tension co-occurrence.
    pub topic_window: usize,
    /// Turns after which an unanswered test resolves as failed.
    pub test_timeout_turns: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            enable_progression: true,
            cycles_threshold: 2,
            max_consequence_tests: 2,
            synthesis_interval: 12,
            entailment_required: true,
            topic_window: 2,
            test_timeout_turns: 3,
        }
    }
}

impl ProgressionConfig {
    /// Defaults overlaid with `DIALECTIC_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_bool("DIALECTIC_ENABLE_PROGRESSION") {
            config.enable_progression = v;
        }
        if let Some(v) = env_parse("DIALECTIC_CYCLES_THRESHOLD") {
            config.cycles_threshold = v;
        }
        if let Some(v) = env_parse("DIALECTIC_MAX_CONSEQUENCE_TESTS") {
            config.max_consequence_tests = v;
        }
        if let Some(v) = env_parse("DIALECTIC_SYNTHESIS_INTERVAL") {
            config.synthesis_interval = v;
        }
        if let Some(v) = env_bool("DIALECTIC_ENTAILMENT_REQUIRED") {
            config.entailment_required = v;
        }
        if let Some(v) = env_parse("DIALECTIC_TOPIC_WINDOW") {
            config.topic_window = v;
        }
        if let Some(v) = env_parse("DIALECTIC_TEST_TIMEOUT_TURNS") {
            config.test_timeout_turns = v;
        }

        config
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> ProgressionResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> ProgressionResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ProgressionError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Reject settings that would make the state machine degenerate.
    pub fn validate(&self) -> ProgressionResult<()> {
        if self.cycles_threshold == 0 {
            return Err(ProgressionError::InvalidConfig(
                "cycles_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_consequence_tests == 0 {
            return Err(ProgressionError::InvalidConfig(
                "max_consequence_tests must be at least 1".to_string(),
            ));
        }
        if self.test_timeout_turns == 0 {
            return Err(ProgressionError::InvalidConfig(
                "test_timeout_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the chat-completions prompt enhancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    /// Full `/chat/completions` URL. Empty means unconfigured.
    pub url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 120,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

impl EnhancerConfig {
    /// Load from `DIALECTIC_ENHANCER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DIALECTIC_ENHANCER_URL") {
            config.url = url;
        }
        if let Ok(model) = std::env::var("DIALECTIC_ENHANCER_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("DIALECTIC_ENHANCER_API_KEY").ok();
        if let Some(v) = env_parse("DIALECTIC_ENHANCER_MAX_TOKENS") {
            config.max_tokens = v;
        }
        if let Some(v) = env_parse("DIALECTIC_ENHANCER_TEMPERATURE") {
            config.temperature = v;
        }
        if let Some(v) = env_parse("DIALECTIC_ENHANCER_TIMEOUT_SECS") {
            config.timeout_secs = v;
        }
        config
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProgressionConfig::default();
        assert!(config.enable_progression);
        assert_eq!(config.cycles_threshold, 2);
        assert_eq!(config.max_consequence_tests, 2);
        assert_eq!(config.synthesis_interval, 12);
        assert_eq!(config.topic_window, 2);
        assert_eq!(config.test_timeout_turns, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_document_keeps_defaults() {
        let config = ProgressionConfig::from_toml_str(
            r#"
            cycles_threshold = 3
            enable_progression = false
            "#,
        )
        .unwrap();
        assert_eq!(config.cycles_threshold, 3);
        assert!(!config.enable_progression);
        assert_eq!(config.max_consequence_tests, 2);
    }

    #[test]
    fn test_toml_rejects_zero_threshold() {
        let err = ProgressionConfig::from_toml_str("cycles_threshold = 0").unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_rejects_malformed() {
        let err = ProgressionConfig::from_toml_str("cycles_threshold = \"two\"").unwrap_err();
        assert!(matches!(err, ProgressionError::ConfigParse(_)));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dialectic.toml");
        std::fs::write(&path, "topic_window = 4\ntest_timeout_turns = 5\n").unwrap();
        let config = ProgressionConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.topic_window, 4);
        assert_eq!(config.test_timeout_turns, 5);

        let missing = ProgressionConfig::from_toml_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ProgressionError::Io { .. })));
    }

    #[test]
    fn test_from_env_overlays_defaults() {
        std::env::set_var("DIALECTIC_CYCLES_THRESHOLD", "4");
        std::env::set_var("DIALECTIC_ENTAILMENT_REQUIRED", "false");
        std::env::set_var("DIALECTIC_TOPIC_WINDOW", "not-a-number");
        let config = ProgressionConfig::from_env();
        std::env::remove_var("DIALECTIC_CYCLES_THRESHOLD");
        std::env::remove_var("DIALECTIC_ENTAILMENT_REQUIRED");
        std::env::remove_var("DIALECTIC_TOPIC_WINDOW");

        assert_eq!(config.cycles_threshold, 4);
        assert!(!config.entailment_required);
        assert_eq!(config.topic_window, 2);
        assert_eq!(config.max_consequence_tests, 2);
    }

    #[test]
    fn test_enhancer_unconfigured_by_default() {
        assert!(!EnhancerConfig::default().is_configured());
    }
}
