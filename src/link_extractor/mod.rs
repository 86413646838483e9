//! Link extraction and ranking
//!
//! Parses a page, scores every anchor against the term dictionary for the
//! requested document kind, applies region multipliers and the related-link
//! heuristic, and returns ranked [`Candidate`]s.
//!
//! Anchors sitting in hidden regions (collapsed menus, modals, `hidden`
//! subtrees) are skipped here and picked up by
//! [`crate::hidden_content`], which scores them with the same
//! [`LinkScorer`] and a visibility discount.

pub mod context;
pub mod related;
pub mod scoring;

use ego_tree::NodeId;
use log::debug;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use context::{ElementContext, HiddenRegions, element_context};
pub use scoring::{ExtractionSignal, LinkScorer, TextMatch};

use crate::config::{DiscoveryConfig, ScoringWeights, TermDictionary};
use crate::discovery::{Candidate, DocumentKind, SourceStage, dedupe_candidates, rank_candidates};
use crate::utils::{collapse_whitespace, domains_related, normalize_label, resolve_href};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href], area[href]").expect("valid anchor selector"));
static IMG_ALT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[alt]").expect("valid img selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid h1 selector"));

/// Knobs shared by every HTML analysis pass within one request.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    pub dictionary: &'a TermDictionary,
    pub weights: &'a ScoringWeights,
    pub threshold: f64,
    /// Links to unrelated domains keep their full score.
    pub allow_off_site: bool,
    /// Links to unrelated domains are dropped (ignored when `allow_off_site`).
    pub same_origin_only: bool,
    pub platform_legal_urls: &'a [String],
}

impl<'a> ExtractOptions<'a> {
    #[must_use]
    pub fn from_config(config: &'a DiscoveryConfig) -> Self {
        Self {
            dictionary: config.dictionary(),
            weights: config.scoring(),
            threshold: config.confidence_threshold(),
            allow_off_site: false,
            same_origin_only: config.same_origin_only(),
            platform_legal_urls: &config.sites().platform_legal_urls,
        }
    }

    #[must_use]
    pub fn with_off_site(mut self, allow: bool) -> Self {
        self.allow_off_site = allow;
        self
    }
}

/// Which anchors a pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// One anchor with everything scoring needs.
#[derive(Debug, Clone)]
pub(crate) struct AnchorInfo {
    pub node: NodeId,
    pub url: Url,
    pub text: String,
    pub context: ElementContext,
    pub container: Option<NodeId>,
}

/// Extract ranked candidates from visible anchors of a static page.
#[must_use]
pub fn extract(html: &str, base_url: &Url, kind: DocumentKind, options: &ExtractOptions<'_>) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    extract_from_document(&document, base_url, kind, options, Visibility::Visible, SourceStage::StaticLink)
}

/// Shared anchor pass over an already parsed document.
pub(crate) fn extract_from_document(
    document: &Html,
    base_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
    visibility: Visibility,
    stage: SourceStage,
) -> Vec<Candidate> {
    let regions = HiddenRegions::collect(document);
    let anchors = collect_anchors(document, base_url, &regions, visibility);
    score_anchors(&anchors, base_url, kind, options, stage, visibility)
}

/// Score a list of anchors, apply the related-link heuristic, rank.
pub(crate) fn score_anchors(
    anchors: &[AnchorInfo],
    base_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
    stage: SourceStage,
    visibility: Visibility,
) -> Vec<Candidate> {
    let scorer = LinkScorer::new(kind, options.dictionary, options.weights);
    let site_host = base_url.host_str().unwrap_or_default();

    let mut signals: Vec<(&AnchorInfo, ExtractionSignal)> = Vec::new();
    for anchor in anchors {
        let Some(mut signal) = scorer.score(&anchor.text, &anchor.url, anchor.context) else {
            continue;
        };
        let link_host = anchor.url.host_str().unwrap_or_default();

        if is_platform_legal(&anchor.url, site_host, options.platform_legal_urls) {
            debug!(target: "policy_locator::extract", "Ignoring platform legal link {}", anchor.url);
            continue;
        }
        if !options.allow_off_site && !domains_related(site_host, link_host) {
            if options.same_origin_only {
                continue;
            }
            signal.computed_score *= options.weights.external_penalty;
        }
        if visibility == Visibility::Hidden {
            signal.computed_score *= options.weights.hidden_discount;
        }
        signals.push((anchor, signal));
    }

    related::apply_related_boost(anchors, &mut signals, kind, options);

    let candidates: Vec<Candidate> = signals
        .into_iter()
        .map(|(anchor, signal)| {
            let mut rationale = signal.describe();
            if visibility == Visibility::Hidden {
                rationale.push_str(" (inside hidden region)");
            }
            Candidate::new(anchor.url.clone(), stage, signal.computed_score, rationale)
        })
        .collect();

    let mut candidates = dedupe_candidates(candidates);
    rank_candidates(&mut candidates);
    debug!(
        target: "policy_locator::extract",
        "{} {kind} candidates from {} anchors on {base_url}",
        candidates.len(),
        anchors.len()
    );
    candidates
}

pub(crate) fn collect_anchors(
    document: &Html,
    base_url: &Url,
    regions: &HiddenRegions,
    visibility: Visibility,
) -> Vec<AnchorInfo> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter(|anchor| (visibility == Visibility::Hidden) == regions.hides(anchor))
        .filter_map(|anchor| anchor_info(&anchor, base_url))
        .collect()
}

pub(crate) fn anchor_info(anchor: &ElementRef<'_>, base_url: &Url) -> Option<AnchorInfo> {
    let href = anchor.value().attr("href")?;
    let url = resolve_href(base_url, href)?;
    Some(AnchorInfo {
        node: anchor.id(),
        url,
        text: anchor_text(anchor),
        context: element_context(anchor),
        container: related::container_of(anchor),
    })
}

/// Visible text of an anchor, falling back to its accessible name.
#[must_use]
pub fn anchor_text(anchor: &ElementRef<'_>) -> String {
    let text = collapse_whitespace(&anchor.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }
    let value = anchor.value();
    if let Some(label) = value.attr("aria-label").or_else(|| value.attr("title")) {
        return collapse_whitespace(label);
    }
    anchor
        .select(&IMG_ALT_SELECTOR)
        .filter_map(|img| img.value().attr("alt"))
        .map(collapse_whitespace)
        .find(|alt| !alt.is_empty())
        .unwrap_or_default()
}

fn is_platform_legal(url: &Url, site_host: &str, platform_legal_urls: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let bare_host = host.trim_start_matches("www.");
    let location = format!("{bare_host}{}", url.path()).to_ascii_lowercase();
    platform_legal_urls.iter().any(|prefix| {
        let prefix_host = prefix.split('/').next().unwrap_or_default();
        location.starts_with(prefix.as_str()) && !domains_related(site_host, prefix_host)
    })
}

/// Whether the page itself already is the requested document.
///
/// True when the title or first heading is a canonical phrase, or when the
/// URL path names the kind and the heading carries a strong term.
#[must_use]
pub fn page_is_policy(html: &str, url: &Url, kind: DocumentKind, dictionary: &TermDictionary) -> Option<String> {
    let document = Html::parse_document(html);
    let terms = dictionary.for_kind(kind);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let heading = document
        .select(&H1_SELECTOR)
        .next()
        .map(|h| h.text().collect::<String>())
        .unwrap_or_default();

    for label in [&heading, &title] {
        let normalized = normalize_label(label);
        let segments = normalized.split(['|', '-', '–', ':']).map(str::trim);
        for segment in segments {
            if terms.canonical.iter().any(|phrase| phrase == segment) {
                return Some(format!("page heading '{}' names the document", collapse_whitespace(label)));
            }
        }
    }

    let path = scoring::decoded_path(url);
    if scoring::match_path(terms, &path).is_some() {
        let (heading_match, _) = scoring::match_text(terms, &normalize_label(&heading));
        if heading_match >= TextMatch::Strong {
            return Some(format!("URL path and heading '{}' both name the document", collapse_whitespace(&heading)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig::default()
    }

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn footer_privacy_link_ranks_first() {
        let html = r#"
            <html><body>
              <nav><a href="/blog">Blog</a><a href="/privacy-center">Privacy center</a></nav>
              <p>We care about your <a href="/cookies">cookies</a>.</p>
              <footer><ul>
                <li><a href="/terms">Terms of Service</a></li>
                <li><a href="/privacy">Privacy Policy</a></li>
              </ul></footer>
            </body></html>"#;
        let config = config();
        let options = ExtractOptions::from_config(&config);
        let candidates = extract(html, &base(), DocumentKind::Privacy, &options);

        assert_eq!(candidates[0].url().as_str(), "https://example.com/privacy");
        assert!(candidates[0].confidence() >= 0.6);
        assert!(candidates.iter().all(|c| c.url().path() != "/terms"));
    }

    #[test]
    fn off_site_links_are_penalized_or_dropped() {
        let html = r#"<footer><a href="https://unrelated.org/privacy">Privacy Policy</a></footer>"#;
        let mut config = config();
        let options = ExtractOptions::from_config(&config);
        let candidates = extract(html, &base(), DocumentKind::Privacy, &options);
        assert!(candidates[0].confidence() < 0.6);

        config.same_origin_only = true;
        let options = ExtractOptions::from_config(&config);
        assert!(extract(html, &base(), DocumentKind::Privacy, &options).is_empty());

        let options = ExtractOptions::from_config(&config).with_off_site(true);
        assert!(extract(html, &base(), DocumentKind::Privacy, &options)[0].confidence() >= 0.6);
    }

    #[test]
    fn platform_legal_links_are_ignored() {
        let html = r#"<footer><a href="https://policies.google.com/privacy">Privacy Policy</a></footer>"#;
        let config = config();
        let options = ExtractOptions::from_config(&config).with_off_site(true);
        assert!(extract(html, &base(), DocumentKind::Privacy, &options).is_empty());
    }

    #[test]
    fn hidden_anchors_are_left_for_the_hidden_pass() {
        let html = r#"<div hidden><a href="/privacy">Privacy Policy</a></div>"#;
        let config = config();
        let options = ExtractOptions::from_config(&config);
        assert!(extract(html, &base(), DocumentKind::Privacy, &options).is_empty());
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let html = r#"<footer><a href="legal/terms.html">Terms of Use</a></footer>"#;
        let config = config();
        let options = ExtractOptions::from_config(&config);
        let base = Url::parse("https://example.com/en/").unwrap();
        let candidates = extract(html, &base, DocumentKind::Terms, &options);
        assert_eq!(candidates[0].url().as_str(), "https://example.com/en/legal/terms.html");
    }

    #[test]
    fn detects_page_that_is_the_policy() {
        let dictionary = TermDictionary::default();
        let url = Url::parse("https://example.com/legal").unwrap();
        let html = "<html><head><title>Privacy Policy | Example</title></head><body><h1>Our commitment</h1></body></html>";
        assert!(page_is_policy(html, &url, DocumentKind::Privacy, &dictionary).is_some());
        assert!(page_is_policy(html, &url, DocumentKind::Terms, &dictionary).is_none());
    }
}
