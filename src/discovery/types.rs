//! Data structures shared by every discovery stage

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::path_depth;

/// Which legal document a request is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Terms,
    Privacy,
}

impl DocumentKind {
    /// The other kind; used by the related-link heuristic and wrong-kind checks.
    #[must_use]
    pub fn counterpart(self) -> Self {
        match self {
            Self::Terms => Self::Privacy,
            Self::Privacy => Self::Terms,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Terms => "terms of service",
            Self::Privacy => "privacy policy",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terms => write!(f, "terms"),
            Self::Privacy => write!(f, "privacy"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terms" | "tos" | "terms_of_service" | "terms-of-service" => Ok(Self::Terms),
            "privacy" | "pp" | "privacy_policy" | "privacy-policy" => Ok(Self::Privacy),
            other => Err(format!("unknown document kind '{other}' (expected terms or privacy)")),
        }
    }
}

/// Which stage produced a candidate. Doubles as the method tag reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStage {
    StaticLink,
    PolicyPage,
    HiddenContent,
    UrlPattern,
    DynamicRender,
    RepositoryFile,
    RepositoryReadme,
    RepositoryContent,
    MarketplaceSection,
    MarketplaceDeveloperSite,
}

impl SourceStage {
    #[must_use]
    pub fn method_tag(self) -> &'static str {
        match self {
            Self::StaticLink => "static_link",
            Self::PolicyPage => "policy_page",
            Self::HiddenContent => "hidden_content",
            Self::UrlPattern => "url_pattern",
            Self::DynamicRender => "dynamic_render",
            Self::RepositoryFile => "code_repository_policy_file",
            Self::RepositoryReadme => "code_repository_readme_link",
            Self::RepositoryContent => "code_repository_content",
            Self::MarketplaceSection => "app_marketplace_section",
            Self::MarketplaceDeveloperSite => "app_marketplace_developer_site",
        }
    }
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_tag())
    }
}

/// A URL proposed by a stage as the document location.
///
/// Immutable once built; the engine only ever appends candidates and picks
/// among them.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    url: Url,
    source_stage: SourceStage,
    confidence: f64,
    rationale: String,
    excerpt: Option<String>,
}

impl Candidate {
    #[must_use]
    pub fn new(
        url: Url,
        source_stage: SourceStage,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            url,
            source_stage,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
            excerpt: None,
        }
    }

    /// Attach document text for content-as-document results.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn source_stage(&self) -> SourceStage {
        self.source_stage
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    #[must_use]
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_deref()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        path_depth(&self.url)
    }
}

/// Order candidates best-first: confidence descending, then shallower path.
///
/// The sort is stable, so equal candidates keep discovery order and repeated
/// runs over the same page pick the same winner.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.depth().cmp(&b.depth()))
    });
}

/// Keep the best-scoring candidate per URL, preserving first-seen order.
#[must_use]
pub fn dedupe_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match out.iter_mut().find(|c| c.url == candidate.url) {
            Some(existing) if candidate.confidence > existing.confidence => *existing = candidate,
            Some(_) => {}
            None => out.push(candidate),
        }
    }
    out
}

/// Auxiliary fields read from an app-marketplace detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDetails {
    pub app_name: Option<String>,
    pub developer_name: Option<String>,
    pub data_categories: Vec<String>,
}

/// Final answer handed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub found: bool,
    pub resolved_url: Option<String>,
    pub method_used: String,
    pub message: String,
    pub document_kind: DocumentKind,
    pub input_url: String,
    pub confidence: Option<f64>,
    pub attempted_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_details: Option<AppDetails>,
    pub checked_at: DateTime<Utc>,
}
