//! Fluent builder for `DiscoveryConfig`
//!
//! Every field has a default, so unlike a typestate builder there is no
//! required step; `build()` runs the same validation as file loading.

use super::ConfigError;
use super::dictionary::TermDictionary;
use super::types::{DiscoveryConfig, ScoringWeights};

#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl From<DiscoveryConfig> for DiscoveryConfigBuilder {
    fn from(config: DiscoveryConfig) -> Self {
        Self { config }
    }
}

impl DiscoveryConfigBuilder {
    #[must_use]
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn request_budget_secs(mut self, secs: u64) -> Self {
        self.config.request_budget_secs = secs;
        self
    }

    #[must_use]
    pub fn same_origin_only(mut self, enabled: bool) -> Self {
        self.config.same_origin_only = enabled;
        self
    }

    #[must_use]
    pub fn probe_url_patterns(mut self, enabled: bool) -> Self {
        self.config.probe_url_patterns = enabled;
        self
    }

    #[must_use]
    pub fn verify_resolution(mut self, enabled: bool) -> Self {
        self.config.verify_resolution = enabled;
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.config.fetch.max_redirects = hops;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.fetch.max_retries = retries;
        self
    }

    #[must_use]
    pub fn retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.fetch.retry_base_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.fetch.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn render_enabled(mut self, enabled: bool) -> Self {
        self.config.render.enabled = enabled;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.render.headless = headless;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn settle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render.settle_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_menu_clicks(mut self, clicks: usize) -> Self {
        self.config.render.max_menu_clicks = clicks;
        self
    }

    #[must_use]
    pub fn max_browser_sessions(mut self, sessions: usize) -> Self {
        self.config.render.max_sessions = sessions;
        self
    }

    #[must_use]
    pub fn max_render_targets(mut self, targets: usize) -> Self {
        self.config.render.max_render_targets = targets;
        self
    }

    #[must_use]
    pub fn scoring(mut self, scoring: ScoringWeights) -> Self {
        self.config.scoring = scoring;
        self
    }

    #[must_use]
    pub fn code_repository_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sites.code_repository_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn app_marketplace_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sites.app_marketplace_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn operator_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sites.operator_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn dictionary(mut self, dictionary: TermDictionary) -> Self {
        self.config.dictionary = dictionary.normalized();
        self
    }

    pub fn build(self) -> Result<DiscoveryConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
