//! Translator configuration
//!
//! JSON configuration resolved into a ready [`MetricsConverter`]. Parsing
//! keeps the difference between an unset exclude list (built-in defaults)
//! and an explicitly empty one (exclude nothing).

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::constants::{DEFAULT_DELTA_TRANSLATION_TTL_SECS, DEFAULT_NONALPHANUMERIC_DIMENSION_CHARS};
use crate::domain::filters::{FilterError, MetricFilter, resolve_exclude_metrics};
use crate::domain::metrics::{ConverterError, MetricsConverter};
use crate::domain::translation::{
    MetricTranslator, Rule, TranslationError, default_translation_rules,
};

fn default_delta_translation_ttl() -> u64 {
    DEFAULT_DELTA_TRANSLATION_TTL_SECS
}

fn default_nonalphanumeric_dimension_chars() -> String {
    DEFAULT_NONALPHANUMERIC_DIMENSION_CHARS.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    /// Translate metrics into vendor-compatible names and rollups
    #[serde(default)]
    pub send_compatible_metrics: bool,
    /// Rule list; `None` uses the built-in rules
    #[serde(default)]
    pub translation_rules: Option<Vec<Rule>>,
    /// Maximum age in seconds of a cached cumulative observation
    #[serde(default = "default_delta_translation_ttl")]
    pub delta_translation_ttl: u64,
    #[serde(default)]
    pub exclude_metrics: Option<Vec<MetricFilter>>,
    #[serde(default)]
    pub include_metrics: Vec<MetricFilter>,
    #[serde(default = "default_nonalphanumeric_dimension_chars")]
    pub nonalphanumeric_dimension_chars: String,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            send_compatible_metrics: false,
            translation_rules: None,
            delta_translation_ttl: DEFAULT_DELTA_TRANSLATION_TTL_SECS,
            exclude_metrics: None,
            include_metrics: Vec::new(),
            nonalphanumeric_dimension_chars: default_nonalphanumeric_dimension_chars(),
            extra: serde_json::Value::Null,
        }
    }
}

impl TranslatorConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::parse(json).context("Failed to parse config")
    }

    fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        tracing::trace!(config = ?config, "Parsed config");
        config.warn_unknown_fields();
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config (possible typos)"
            );
        }
    }

    /// Configured rules, or the built-in ones
    pub fn translation_rules(&self) -> Result<Vec<Rule>, TranslationError> {
        match &self.translation_rules {
            Some(rules) => Ok(rules.clone()),
            None => default_translation_rules(),
        }
    }

    /// Effective exclude list
    pub fn resolve_exclude_metrics(&self) -> Result<Vec<MetricFilter>, FilterError> {
        resolve_exclude_metrics(self.exclude_metrics.clone())
    }

    /// Validate everything and build the converter
    pub fn build_converter(&self) -> Result<MetricsConverter, ConverterError> {
        let translator = if self.send_compatible_metrics {
            let translator =
                MetricTranslator::new(self.translation_rules()?, self.delta_translation_ttl)?;
            Some(Arc::new(translator))
        } else {
            None
        };
        let excludes = self.resolve_exclude_metrics()?;
        MetricsConverter::new(
            translator,
            &excludes,
            &self.include_metrics,
            &self.nonalphanumeric_dimension_chars,
        )
    }
}
