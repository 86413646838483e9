//! Resolution engine
//!
//! [`Discoverer`] runs the stage machine from [`super::state`] for one
//! request: specializer, static probe, hidden scan, pattern probe, dynamic
//! render. After every stage the best qualifying candidate is verified; the
//! first one that survives resolves the request. The whole run is bounded by
//! the request budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use url::Url;

use super::error::DiscoveryError;
use super::request::DiscoveryRequest;
use super::state::{ExhaustionReason, Stage, StageFacts, next_stage};
use super::types::{Candidate, DiscoveryResponse, DocumentKind, SourceStage};
use crate::config::DiscoveryConfig;
use crate::fetcher::{FetchStatus, StaticFetcher};
use crate::hidden_content;
use crate::link_extractor::{self, ExtractOptions};
use crate::normalizer::{self, UrlVariant, root_of};
use crate::renderer::{BrowserLauncher, ChromiumLauncher, DynamicRenderer, SessionPool};
use crate::specializer::{self, SiteClassification, SiteProfile};
use crate::utils::visit_key;

/// Receives every final response, e.g. to persist it. Failures are logged
/// and never change the response.
pub trait ResultSink: Send + Sync {
    fn record<'a>(&'a self, response: &'a DiscoveryResponse) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Entry point for discovery. Cheap to clone; clones share the HTTP client
/// and the browser session pool.
#[derive(Clone)]
pub struct Discoverer {
    config: Arc<DiscoveryConfig>,
    fetcher: StaticFetcher,
    renderer: Option<DynamicRenderer>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl std::fmt::Debug for Discoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discoverer")
            .field("config", &self.config)
            .field("renderer", &self.renderer)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Discoverer {
    /// Discoverer rendering with headless Chromium.
    pub fn new(config: DiscoveryConfig) -> anyhow::Result<Self> {
        let launcher = Arc::new(ChromiumLauncher::new(config.render()));
        Self::with_launcher(config, launcher)
    }

    /// Discoverer rendering through a custom browser launcher.
    pub fn with_launcher(config: DiscoveryConfig, launcher: Arc<dyn BrowserLauncher>) -> anyhow::Result<Self> {
        let fetcher = StaticFetcher::new(config.fetch())?;
        let renderer = config.render().enabled.then(|| {
            let pool = SessionPool::new(launcher, config.render().max_sessions);
            DynamicRenderer::new(pool, config.render().clone())
        });
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            renderer,
            sink: None,
        })
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Browser sessions currently alive across all clones.
    #[must_use]
    pub fn live_browser_sessions(&self) -> usize {
        self.renderer.as_ref().map_or(0, |r| r.pool().live_sessions())
    }

    /// Browser sessions launched over this discoverer's lifetime.
    #[must_use]
    pub fn browser_launches(&self) -> u64 {
        self.renderer.as_ref().map_or(0, |r| r.pool().total_launched())
    }

    /// Locate the `kind` document for `input`.
    ///
    /// Returns `Err` only when `input` is not a usable URL; every other
    /// failure becomes a `found = false` response explaining what happened.
    pub async fn discover(&self, kind: DocumentKind, input: &str) -> Result<DiscoveryResponse, DiscoveryError> {
        let variants = normalizer::normalize(input)?;
        let started = Instant::now();
        let budget = self.config.request_budget();
        let mut request = DiscoveryRequest::new(input.trim(), kind);

        info!(target: "policy_locator::engine", "Discovering {kind} for {}", variants[0].url);
        let response = match tokio::time::timeout(budget, self.run(&mut request, &variants)).await {
            Ok(Some(winner)) => self.resolved_response(&request, &winner),
            Ok(None) => self.exhausted_response(&request),
            Err(_) => {
                warn!(
                    target: "policy_locator::engine",
                    "Discovery of {kind} for {} exceeded its {}s budget",
                    variants[0].url,
                    budget.as_secs()
                );
                self.timeout_response(&request, budget)
            }
        };

        info!(
            target: "policy_locator::engine",
            "Finished {kind} discovery for {} in {:?}: {} ({})",
            variants[0].url,
            started.elapsed(),
            response.method_used,
            response.resolved_url.as_deref().unwrap_or("not found")
        );

        if let Some(sink) = &self.sink
            && let Err(e) = sink.record(&response).await
        {
            warn!(target: "policy_locator::engine", "Result sink failed: {e:#}");
        }
        Ok(response)
    }

    // =========================================================================
    // Stage machine
    // =========================================================================

    async fn run(&self, request: &mut DiscoveryRequest, variants: &[UrlVariant]) -> Option<Candidate> {
        let exact = &variants.first()?.url;
        let classification = SiteClassification::classify(exact, self.config.sites());
        let profile = classification.profile(self.config.sites());
        let options = ExtractOptions::from_config(&self.config).with_off_site(profile.allow_off_site());
        debug!(
            target: "policy_locator::engine",
            "{exact} classified as {}",
            classification.name()
        );

        let mut stage = Stage::NotStarted;
        let mut winner = None;
        loop {
            let facts = StageFacts {
                specialized_site: !classification.is_generic(),
                resolved: winner.is_some(),
                probe_patterns: self.config.probe_url_patterns(),
                render_enabled: self.renderer.is_some(),
            };
            stage = next_stage(stage, facts);
            debug!(target: "policy_locator::engine", "Entering stage {stage}");

            match stage {
                Stage::Resolved => return winner,
                Stage::Exhausted => return None,
                Stage::NotStarted => {}
                Stage::Specialized => self.specialize(&classification, request, &options, &profile).await,
                Stage::StaticProbe => self.static_probe(request, variants, &options, &profile).await,
                Stage::HiddenScan => self.hidden_scan(request, &options, &profile),
                Stage::PatternProbe => self.pattern_probe(request, exact, &profile).await,
                Stage::DynamicRender => self.dynamic_render(request, exact, &options, &profile).await,
            }
            winner = self.verified_winner(request).await;
        }
    }

    async fn specialize(
        &self,
        classification: &SiteClassification,
        request: &mut DiscoveryRequest,
        options: &ExtractOptions<'_>,
        profile: &SiteProfile,
    ) {
        request.mark_attempted(classification.name());
        let candidates = match classification {
            SiteClassification::Generic => return,
            SiteClassification::CodeRepository(repo) => {
                specializer::code_repository::discover(repo, request, &self.fetcher, options).await
            }
            SiteClassification::AppMarketplace(store) => {
                let findings =
                    specializer::app_marketplace::discover(store, request, &self.fetcher, options, profile).await;
                if let Some(details) = findings.app_details {
                    request.set_app_details(details);
                }
                findings.candidates
            }
        };
        request.add_candidates(profile.filter(candidates));
    }

    /// Fetch variants in order, scoring each page, until one qualifies.
    async fn static_probe(
        &self,
        request: &mut DiscoveryRequest,
        variants: &[UrlVariant],
        options: &ExtractOptions<'_>,
        profile: &SiteProfile,
    ) {
        request.mark_attempted(SourceStage::StaticLink.method_tag());
        let kind = request.kind();

        for variant in variants {
            let Some((page_url, html)) = self.load_page(request, &variant.url).await else {
                continue;
            };
            request.set_resolved_base(root_of(&page_url));

            if let Some(reason) = link_extractor::page_is_policy(&html, &page_url, kind, options.dictionary)
                && !profile.excludes(&page_url)
            {
                request.add_candidates([Candidate::new(
                    page_url.clone(),
                    SourceStage::PolicyPage,
                    options.weights.policy_page,
                    reason,
                )]);
            }

            let found = link_extractor::extract(&html, &page_url, kind, options);
            debug!(
                target: "policy_locator::engine",
                "{} static {kind} candidates on {page_url} ({:?})",
                found.len(),
                variant.kind
            );
            request.add_candidates(profile.filter(found));

            if hidden_content::is_likely_spa(&html) {
                request.note_spa();
            }
            if request.has_qualifying(options.threshold) {
                break;
            }
        }
    }

    /// Hidden regions and scripts of every page fetched so far.
    fn hidden_scan(&self, request: &mut DiscoveryRequest, options: &ExtractOptions<'_>, profile: &SiteProfile) {
        request.mark_attempted(SourceStage::HiddenContent.method_tag());
        let kind = request.kind();
        let found: Vec<Candidate> = request
            .pages()
            .iter()
            .flat_map(|page| hidden_content::scan(&page.html, &page.final_url, kind, options))
            .collect();
        request.add_candidates(profile.filter(found));
    }

    /// Probe conventional legal paths on the resolved base.
    async fn pattern_probe(&self, request: &mut DiscoveryRequest, exact: &Url, profile: &SiteProfile) {
        let base = request.resolved_base().cloned().unwrap_or_else(|| root_of(exact));
        if profile.excludes(&base) {
            debug!(target: "policy_locator::engine", "Skipping pattern probe on operator site {base}");
            return;
        }
        request.mark_attempted(SourceStage::UrlPattern.method_tag());

        let kind = request.kind();
        let dictionary = self.config.dictionary();
        for path in &dictionary.for_kind(kind).probe_paths {
            let Ok(url) = base.join(path) else { continue };
            let Some((page_url, html)) = self.load_page(request, &url).await else {
                continue;
            };
            if let Some(reason) = link_extractor::page_is_policy(&html, &page_url, kind, dictionary) {
                info!(target: "policy_locator::engine", "Pattern probe hit {page_url}");
                request.add_candidates([Candidate::new(
                    page_url,
                    SourceStage::UrlPattern,
                    self.config.scoring().pattern_probe,
                    format!("conventional path {path}: {reason}"),
                )]);
                return;
            }
        }
    }

    /// Render the input page (and the site root) in a browser.
    async fn dynamic_render(
        &self,
        request: &mut DiscoveryRequest,
        exact: &Url,
        options: &ExtractOptions<'_>,
        profile: &SiteProfile,
    ) {
        let Some(renderer) = &self.renderer else { return };
        request.mark_attempted(SourceStage::DynamicRender.method_tag());

        let kind = request.kind();
        let landing = request
            .page(exact)
            .map(|page| page.final_url.clone())
            .unwrap_or_else(|| exact.clone());
        let mut targets = vec![landing];
        if let Some(base) = request.resolved_base() {
            targets.push(base.clone());
        }
        targets.dedup_by_key(|url| visit_key(url.as_str()));
        targets.truncate(renderer.settings().max_render_targets.max(1));

        for target in targets {
            let outcome = renderer.render_and_extract(&target, kind, options).await;
            request.mark_visited(&target);
            if let Some(final_url) = &outcome.final_url {
                request.mark_visited(final_url);
            }
            if let Some(error) = outcome.error {
                request.note_render_failure();
                request.record_error(error);
                continue;
            }
            request.add_candidates(profile.filter(outcome.candidates));
            if request.has_qualifying(options.threshold) {
                break;
            }
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Best qualifying candidate that survives verification. Candidates whose
    /// URL does not exist are rejected for the rest of the request.
    async fn verified_winner(&self, request: &mut DiscoveryRequest) -> Option<Candidate> {
        for candidate in request.qualifying(self.config.confidence_threshold()) {
            if !self.config.verify_resolution() || self.verify(request, candidate.url()).await {
                return Some(candidate);
            }
            info!(
                target: "policy_locator::engine",
                "Rejecting {} ({}): page does not exist",
                candidate.url(),
                candidate.source_stage()
            );
            request.reject(candidate.url());
        }
        None
    }

    async fn verify(&self, request: &mut DiscoveryRequest, url: &Url) -> bool {
        let status = match request.status_of(url) {
            Some(status) => status.clone(),
            None => match request.fetch(&self.fetcher, url).await {
                Some(result) => result.status,
                // Rendered, never fetched.
                None => return true,
            },
        };
        !matches!(status, FetchStatus::HttpError(404 | 410))
    }

    /// Body of `url`, fetching it unless this request already holds it.
    async fn load_page(&self, request: &mut DiscoveryRequest, url: &Url) -> Option<(Url, String)> {
        match request.fetch(&self.fetcher, url).await {
            Some(result) if result.is_ok() => result.html_body.map(|html| (result.final_url, html)),
            Some(result) => {
                debug!(target: "policy_locator::engine", "{url}: {}", result.status.explain());
                None
            }
            None => request
                .page(url)
                .map(|page| (page.final_url.clone(), page.html.clone())),
        }
    }

    // =========================================================================
    // Responses
    // =========================================================================

    fn response(&self, request: &DiscoveryRequest, method_used: &str, message: String) -> DiscoveryResponse {
        DiscoveryResponse {
            found: false,
            resolved_url: None,
            method_used: method_used.to_string(),
            message,
            document_kind: request.kind(),
            input_url: request.original_url().to_string(),
            confidence: None,
            attempted_methods: request.attempted().iter().map(|m| (*m).to_string()).collect(),
            document_excerpt: None,
            app_details: request.app_details().cloned(),
            checked_at: Utc::now(),
        }
    }

    fn resolved_response(&self, request: &DiscoveryRequest, winner: &Candidate) -> DiscoveryResponse {
        let method = winner.source_stage().method_tag();
        let message = format!(
            "Found the {} via {method} (confidence {:.2}): {}",
            request.kind().label(),
            winner.confidence(),
            winner.rationale()
        );
        DiscoveryResponse {
            found: true,
            resolved_url: Some(winner.url().to_string()),
            confidence: Some(winner.confidence()),
            document_excerpt: winner.excerpt().map(str::to_string),
            ..self.response(request, method, message)
        }
    }

    fn exhausted_response(&self, request: &DiscoveryRequest) -> DiscoveryResponse {
        let reason = ExhaustionReason::diagnose(request.tally(), request.spa_detected(), request.render_failed());
        let mut message = format!(
            "No {} found after trying {}. Likely cause: {reason} ({}).",
            request.kind().label(),
            describe_methods(request.attempted()),
            reason.explain()
        );
        if reason == ExhaustionReason::AccessBlocked
            && let Some(error) = request.errors().iter().find(|e| e.is_access_denied())
        {
            message.push_str(&format!(" Last refusal: {error}."));
        }
        if let Some(best) = request.ranked().into_iter().find(|c| !request.is_rejected(c.url())) {
            message.push_str(&format!(
                " Best low-confidence candidate: {} ({:.2}, {}).",
                best.url(),
                best.confidence(),
                best.source_stage()
            ));
        }
        self.response(request, "exhausted", message)
    }

    fn timeout_response(&self, request: &DiscoveryRequest, budget: Duration) -> DiscoveryResponse {
        let message = format!(
            "Discovery of the {} exceeded its {}s budget after trying {}.",
            request.kind().label(),
            budget.as_secs(),
            describe_methods(request.attempted())
        );
        self.response(request, "timeout", message)
    }
}

fn describe_methods(methods: &[&str]) -> String {
    if methods.is_empty() {
        "no methods".to_string()
    } else {
        methods.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_list_reads_naturally() {
        assert_eq!(describe_methods(&[]), "no methods");
        assert_eq!(describe_methods(&["static_link", "hidden_content"]), "static_link, hidden_content");
    }
}
