//! Getter methods for `DiscoveryConfig`

use std::time::Duration;

use super::dictionary::TermDictionary;
use super::types::{DiscoveryConfig, FetchSettings, RenderSettings, ScoringWeights, SiteSettings};

impl DiscoveryConfig {
    #[must_use]
    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    #[must_use]
    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    #[must_use]
    pub fn same_origin_only(&self) -> bool {
        self.same_origin_only
    }

    #[must_use]
    pub fn probe_url_patterns(&self) -> bool {
        self.probe_url_patterns
    }

    #[must_use]
    pub fn verify_resolution(&self) -> bool {
        self.verify_resolution
    }

    #[must_use]
    pub fn fetch(&self) -> &FetchSettings {
        &self.fetch
    }

    #[must_use]
    pub fn render(&self) -> &RenderSettings {
        &self.render
    }

    #[must_use]
    pub fn scoring(&self) -> &ScoringWeights {
        &self.scoring
    }

    #[must_use]
    pub fn sites(&self) -> &SiteSettings {
        &self.sites
    }

    #[must_use]
    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }
}
