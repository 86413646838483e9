//! Per-request working state
//!
//! A [`DiscoveryRequest`] lives for one `discover` call. It owns the visited
//! set (so no URL is fetched twice), the append-only candidate list, and the
//! bookkeeping the final message is built from.

use std::collections::{HashMap, HashSet};

use url::Url;

use super::error::DiscoveryError;
use super::types::{AppDetails, Candidate, DocumentKind, rank_candidates};
use crate::fetcher::{FetchResult, FetchStatus, StaticFetcher};
use crate::utils::visit_key;

/// An HTML page retrieved during this request.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: Url,
    pub final_url: Url,
    pub html: String,
}

/// Counts used to guess why a request came up empty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureTally {
    pub attempts: usize,
    pub succeeded: usize,
    /// Blocked or rate limited.
    pub blocked: usize,
    pub failed: usize,
}

impl FailureTally {
    fn record(&mut self, status: &FetchStatus) {
        self.attempts += 1;
        match status {
            FetchStatus::Ok => self.succeeded += 1,
            FetchStatus::Blocked(_) | FetchStatus::RateLimited => self.blocked += 1,
            _ => self.failed += 1,
        }
    }

    /// Nothing came back and at least one site refused us outright.
    #[must_use]
    pub fn access_blocked(&self) -> bool {
        self.succeeded == 0 && self.blocked > 0
    }
}

#[derive(Debug)]
pub struct DiscoveryRequest {
    original_url: String,
    kind: DocumentKind,
    resolved_base: Option<Url>,
    visited: HashSet<String>,
    statuses: HashMap<String, FetchStatus>,
    candidates: Vec<Candidate>,
    /// Candidates whose URL turned out not to exist.
    rejected: HashSet<String>,
    pages: Vec<FetchedPage>,
    tally: FailureTally,
    attempted: Vec<&'static str>,
    errors: Vec<DiscoveryError>,
    spa_detected: bool,
    render_failed: bool,
    app_details: Option<AppDetails>,
}

impl DiscoveryRequest {
    #[must_use]
    pub fn new(original_url: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            original_url: original_url.into(),
            kind,
            resolved_base: None,
            visited: HashSet::new(),
            statuses: HashMap::new(),
            candidates: Vec::new(),
            rejected: HashSet::new(),
            pages: Vec::new(),
            tally: FailureTally::default(),
            attempted: Vec::new(),
            errors: Vec::new(),
            spa_detected: false,
            render_failed: false,
            app_details: None,
        }
    }

    #[must_use]
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    #[must_use]
    pub fn resolved_base(&self) -> Option<&Url> {
        self.resolved_base.as_ref()
    }

    pub fn set_resolved_base(&mut self, url: Url) {
        self.resolved_base.get_or_insert(url);
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Fetch `url` unless this request already did. `None` means it was
    /// visited before; look for it with [`Self::page`] or [`Self::status_of`].
    ///
    /// Every redirect hop and the final URL are marked visited too, and
    /// successful HTML bodies are kept for later stages. A redirect into a
    /// URL fetched earlier is not followed again; the result then carries the
    /// stored status and body of that URL.
    pub async fn fetch(&mut self, fetcher: &StaticFetcher, url: &Url) -> Option<FetchResult> {
        if !self.visited.insert(visit_key(url.as_str())) {
            return None;
        }

        let visited = &self.visited;
        let mut result = fetcher
            .fetch_unvisited(url, |hop| visited.contains(&visit_key(hop.as_str())))
            .await;
        if result.rejoined {
            self.fill_from_earlier(&mut result);
        }

        for hop in result.redirect_chain.iter().chain(std::iter::once(&result.final_url)) {
            let key = visit_key(hop.as_str());
            self.visited.insert(key.clone());
            self.statuses.entry(key).or_insert_with(|| result.status.clone());
        }
        self.statuses.insert(visit_key(url.as_str()), result.status.clone());
        self.tally.record(&result.status);
        if !result.rejoined
            && let Some(error) = result.to_error()
        {
            self.errors.push(error);
        }

        if !result.rejoined
            && let Some(body) = result.html_body.as_deref()
            && result.is_ok()
            && looks_like_html(body)
        {
            self.pages.push(FetchedPage {
                requested_url: url.clone(),
                final_url: result.final_url.clone(),
                html: body.to_string(),
            });
        }
        Some(result)
    }

    /// Complete a result whose redirect chain ended at an already visited URL.
    /// A URL that was only rendered has no status; it loaded, so it counts as ok.
    fn fill_from_earlier(&self, result: &mut FetchResult) {
        result.status = self.status_of(&result.final_url).cloned().unwrap_or(FetchStatus::Ok);
        if let Some(page) = self.page(&result.final_url) {
            result.html_body = Some(page.html.clone());
            result.final_url = page.final_url.clone();
        }
    }

    /// Mark a URL visited without fetching it (e.g. it was rendered).
    pub fn mark_visited(&mut self, url: &Url) {
        self.visited.insert(visit_key(url.as_str()));
    }

    #[must_use]
    pub fn was_visited(&self, url: &Url) -> bool {
        self.visited.contains(&visit_key(url.as_str()))
    }

    /// Status of an earlier fetch of `url` (requested, redirect hop, or final).
    #[must_use]
    pub fn status_of(&self, url: &Url) -> Option<&FetchStatus> {
        self.statuses.get(&visit_key(url.as_str()))
    }

    /// A kept HTML page reached through `url`.
    #[must_use]
    pub fn page(&self, url: &Url) -> Option<&FetchedPage> {
        let key = visit_key(url.as_str());
        self.pages.iter().find(|page| {
            visit_key(page.requested_url.as_str()) == key || visit_key(page.final_url.as_str()) == key
        })
    }

    #[must_use]
    pub fn pages(&self) -> &[FetchedPage] {
        &self.pages
    }

    #[must_use]
    pub fn tally(&self) -> FailureTally {
        self.tally
    }

    #[must_use]
    pub fn errors(&self) -> &[DiscoveryError] {
        &self.errors
    }

    pub fn record_error(&mut self, error: DiscoveryError) {
        self.errors.push(error);
    }

    // =========================================================================
    // Candidates
    // =========================================================================

    pub fn add_candidates(&mut self, candidates: impl IntoIterator<Item = Candidate>) {
        self.candidates.extend(candidates);
    }

    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// All candidates, best first.
    #[must_use]
    pub fn ranked(&self) -> Vec<Candidate> {
        let mut ranked = self.candidates.clone();
        rank_candidates(&mut ranked);
        ranked
    }

    /// Candidates at or above `threshold` that have not been rejected, best first.
    #[must_use]
    pub fn qualifying(&self, threshold: f64) -> Vec<Candidate> {
        self.ranked()
            .into_iter()
            .filter(|c| c.confidence() >= threshold && !self.is_rejected(c.url()))
            .collect()
    }

    #[must_use]
    pub fn has_qualifying(&self, threshold: f64) -> bool {
        self.candidates
            .iter()
            .any(|c| c.confidence() >= threshold && !self.is_rejected(c.url()))
    }

    pub fn reject(&mut self, url: &Url) {
        self.rejected.insert(visit_key(url.as_str()));
    }

    #[must_use]
    pub fn is_rejected(&self, url: &Url) -> bool {
        self.rejected.contains(&visit_key(url.as_str()))
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    /// Record that a method ran. Order is kept; repeats are ignored.
    pub fn mark_attempted(&mut self, method: &'static str) {
        if !self.attempted.contains(&method) {
            self.attempted.push(method);
        }
    }

    #[must_use]
    pub fn attempted(&self) -> &[&'static str] {
        &self.attempted
    }

    pub fn note_spa(&mut self) {
        self.spa_detected = true;
    }

    #[must_use]
    pub fn spa_detected(&self) -> bool {
        self.spa_detected
    }

    pub fn note_render_failure(&mut self) {
        self.render_failed = true;
    }

    #[must_use]
    pub fn render_failed(&self) -> bool {
        self.render_failed
    }

    pub fn set_app_details(&mut self, details: AppDetails) {
        self.app_details = Some(details);
    }

    #[must_use]
    pub fn app_details(&self) -> Option<&AppDetails> {
        self.app_details.as_ref()
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(2048).collect::<String>().to_ascii_lowercase();
    head.trim_start().starts_with('<') || head.contains("<html") || head.contains("<body")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceStage;

    #[test]
    fn attempted_methods_keep_first_order() {
        let mut request = DiscoveryRequest::new("example.com", DocumentKind::Privacy);
        request.mark_attempted("static_link");
        request.mark_attempted("hidden_content");
        request.mark_attempted("static_link");
        assert_eq!(request.attempted(), ["static_link", "hidden_content"]);
    }

    #[test]
    fn visited_ignores_fragments() {
        let mut request = DiscoveryRequest::new("example.com", DocumentKind::Terms);
        request.mark_visited(&Url::parse("https://example.com/terms#section-2").unwrap());
        assert!(request.was_visited(&Url::parse("https://example.com/terms").unwrap()));
    }

    #[test]
    fn ranked_prefers_confidence() {
        let mut request = DiscoveryRequest::new("example.com", DocumentKind::Privacy);
        let url = |p: &str| Url::parse("https://example.com").unwrap().join(p).unwrap();
        request.add_candidates([
            Candidate::new(url("/a"), SourceStage::HiddenContent, 0.4, "weak"),
            Candidate::new(url("/privacy"), SourceStage::StaticLink, 0.9, "strong"),
        ]);
        assert_eq!(request.ranked()[0].url().path(), "/privacy");
        assert!(request.has_qualifying(0.6));
        assert!(!request.has_qualifying(0.95));

        request.reject(&url("/privacy"));
        assert!(!request.has_qualifying(0.6));
        assert!(request.qualifying(0.3).iter().all(|c| c.url().path() == "/a"));
    }

    #[test]
    fn blocked_only_when_nothing_succeeded() {
        let mut tally = FailureTally::default();
        tally.record(&FetchStatus::Blocked(403));
        tally.record(&FetchStatus::HttpError(404));
        assert!(tally.access_blocked());
        tally.record(&FetchStatus::Ok);
        assert!(!tally.access_blocked());
    }
}
