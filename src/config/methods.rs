//! Loading and validation for `DiscoveryConfig`

use std::path::Path;

use super::ConfigError;
use super::builder::DiscoveryConfigBuilder;
use super::dictionary::TermDictionary;
use super::types::DiscoveryConfig;
use crate::utils::constants::{MAX_FETCH_RETRIES, MAX_MENU_CLICKS, MAX_RETRY_BASE_DELAY_MS};

impl DiscoveryConfig {
    /// Start a builder seeded with defaults.
    #[must_use]
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::default()
    }

    /// Start a builder seeded with this config, e.g. to layer CLI flags over a file.
    #[must_use]
    pub fn to_builder(self) -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::from(self)
    }

    /// Load a JSON config file. Missing keys keep their defaults; a
    /// `dictionary_path` key, resolved relative to the config file, replaces
    /// the embedded term dictionary.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw)?;

        if let Some(dictionary_path) = config.dictionary_path.clone() {
            let resolved = if dictionary_path.is_relative() {
                path.parent()
                    .map_or(dictionary_path.clone(), |dir| dir.join(&dictionary_path))
            } else {
                dictionary_path
            };
            config.dictionary = TermDictionary::from_json_file(resolved)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be in (0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.request_budget_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_budget_secs must be positive".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_secs must be positive".to_string(),
            ));
        }
        if self.fetch.max_retries > MAX_FETCH_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "fetch.max_retries must be at most {MAX_FETCH_RETRIES}, got {}",
                self.fetch.max_retries
            )));
        }
        if self.fetch.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "fetch.retry_base_delay_ms must be at most {MAX_RETRY_BASE_DELAY_MS}, got {}",
                self.fetch.retry_base_delay_ms
            )));
        }
        if self.render.max_menu_clicks > MAX_MENU_CLICKS {
            return Err(ConfigError::Invalid(format!(
                "render.max_menu_clicks must be at most {MAX_MENU_CLICKS}, got {}",
                self.render.max_menu_clicks
            )));
        }
        if self.render.enabled && self.render.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "render.max_sessions must be positive when rendering is enabled".to_string(),
            ));
        }

        let scoring = &self.scoring;
        for (name, boost) in [
            ("footer_boost", scoring.footer_boost),
            ("nav_boost", scoring.nav_boost),
            ("header_boost", scoring.header_boost),
        ] {
            if boost < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be >= 1.0, got {boost}"
                )));
            }
        }
        if scoring.footer_boost < scoring.nav_boost {
            return Err(ConfigError::Invalid(
                "scoring.footer_boost must not be smaller than scoring.nav_boost".to_string(),
            ));
        }
        for (name, factor) in [
            ("external_penalty", scoring.external_penalty),
            ("hidden_discount", scoring.hidden_discount),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be in [0, 1], got {factor}"
                )));
            }
        }
        Ok(())
    }
}
