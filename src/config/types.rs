//! Core configuration types for policy discovery
//!
//! `DiscoveryConfig` carries every tunable the pipeline reads. It deserializes
//! from JSON with all fields optional, so a config file only needs the keys it
//! changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::dictionary::TermDictionary;
use crate::utils::constants::{
    CHROME_USER_AGENT, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FETCH_RETRIES,
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_BROWSER_SESSIONS, DEFAULT_MAX_MENU_CLICKS,
    DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_RENDER_TARGETS, DEFAULT_NAVIGATION_TIMEOUT_SECS,
    DEFAULT_REQUEST_BUDGET_SECS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SETTLE_TIMEOUT_SECS,
};

/// Main configuration struct for discovery requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Minimum confidence for a candidate to resolve a request.
    pub(crate) confidence_threshold: f64,

    /// Wall-clock budget for the whole request, all stages included.
    pub(crate) request_budget_secs: u64,

    /// Discard links to unrelated domains instead of merely down-weighting them.
    ///
    /// Site-type specializers that expect off-site links (app marketplaces)
    /// override this for their own requests.
    pub(crate) same_origin_only: bool,

    /// Probe conventional legal paths (`/privacy`, `/terms`) before rendering.
    pub(crate) probe_url_patterns: bool,

    /// Fetch the winning candidate before returning it.
    pub(crate) verify_resolution: bool,

    pub(crate) fetch: FetchSettings,
    pub(crate) render: RenderSettings,
    pub(crate) scoring: ScoringWeights,
    pub(crate) sites: SiteSettings,

    /// Optional path to a replacement term dictionary, read at load time.
    pub(crate) dictionary_path: Option<PathBuf>,

    #[serde(skip)]
    pub(crate) dictionary: TermDictionary,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            request_budget_secs: DEFAULT_REQUEST_BUDGET_SECS,
            same_origin_only: false,
            probe_url_patterns: true,
            verify_resolution: true,
            fetch: FetchSettings::default(),
            render: RenderSettings::default(),
            scoring: ScoringWeights::default(),
            sites: SiteSettings::default(),
            dictionary_path: None,
            dictionary: TermDictionary::default(),
        }
    }
}

/// Static fetcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_retries: DEFAULT_FETCH_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            user_agent: CHROME_USER_AGENT.to_string(),
        }
    }
}

/// Headless renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// When false the engine goes straight from the static stages to `Exhausted`.
    pub enabled: bool,
    pub headless: bool,
    pub navigation_timeout_secs: u64,
    pub settle_timeout_secs: u64,
    pub max_menu_clicks: usize,
    /// Process-wide cap on concurrent browser sessions.
    pub max_sessions: usize,
    pub max_render_targets: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            settle_timeout_secs: DEFAULT_SETTLE_TIMEOUT_SECS,
            max_menu_clicks: DEFAULT_MAX_MENU_CLICKS,
            max_sessions: DEFAULT_MAX_BROWSER_SESSIONS,
            max_render_targets: DEFAULT_MAX_RENDER_TARGETS,
        }
    }
}

/// Weights and multipliers for link scoring
///
/// Only the relative ordering they produce matters: canonical phrase above
/// strong term above path evidence above weak term, footer above nav above
/// header above body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub exact_text: f64,
    pub strong_text: f64,
    pub weak_text: f64,
    pub href_path: f64,
    /// Added when both the text and the href carry evidence.
    pub text_href_agreement: f64,
    pub footer_boost: f64,
    pub nav_boost: f64,
    pub header_boost: f64,
    /// Multiplier for links to unrelated domains.
    pub external_penalty: f64,
    /// Added to siblings of a confident counterpart-kind link.
    pub related_link_boost: f64,
    /// Multiplier for links found in hidden regions.
    pub hidden_discount: f64,
    /// Base score for a URL string found inside a script block.
    pub script_url: f64,
    /// Added when a JSON key names the document kind.
    pub json_key_bonus: f64,
    pub pattern_probe: f64,
    /// Score for the input page itself when it already is the document.
    pub policy_page: f64,
    pub repository_file: f64,
    pub repository_content: f64,
    /// Floor for links found in a marketplace's developer region.
    pub marketplace_region: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact_text: 0.7,
            strong_text: 0.5,
            weak_text: 0.25,
            href_path: 0.45,
            text_href_agreement: 0.1,
            footer_boost: 1.3,
            nav_boost: 1.1,
            header_boost: 1.05,
            external_penalty: 0.5,
            related_link_boost: 0.15,
            hidden_discount: 0.9,
            script_url: 0.5,
            json_key_bonus: 0.15,
            pattern_probe: 0.65,
            policy_page: 0.75,
            repository_file: 0.9,
            repository_content: 0.65,
            marketplace_region: 0.75,
        }
    }
}

/// Host lists driving site classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub code_repository_hosts: Vec<String>,
    pub app_marketplace_hosts: Vec<String>,
    /// Domains owned by marketplace or hosting operators; their links are
    /// never returned for a specialized site.
    pub operator_domains: Vec<String>,
    /// Big-platform legal pages that show up on countless unrelated sites.
    pub platform_legal_urls: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            code_repository_hosts: to_strings(&[
                "github.com",
                "gitlab.com",
                "bitbucket.org",
                "codeberg.org",
            ]),
            app_marketplace_hosts: to_strings(&[
                "apps.apple.com",
                "itunes.apple.com",
                "play.google.com",
            ]),
            operator_domains: to_strings(&[
                "apple.com",
                "google.com",
                "github.com",
                "githubassets.com",
                "gitlab.com",
                "atlassian.com",
                "bitbucket.org",
                "codeberg.org",
            ]),
            platform_legal_urls: to_strings(&[
                "policies.google.com",
                "google.com/terms",
                "google.com/intl",
                "play.google.com/intl",
                "apple.com/legal",
                "microsoft.com/terms",
                "privacy.microsoft.com",
                "twitter.com/tos",
                "x.com/tos",
                "facebook.com/terms",
                "facebook.com/policy",
                "docs.github.com/site-policy",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
