//! Dynamic rendering stage
//!
//! Loads a page in a real browser, lets client-side code build the DOM,
//! dismisses consent overlays, opens collapsed menus, and re-runs the static
//! analyses against what the browser ended up with.

pub mod chromium;
pub mod js_scripts;
pub mod session_pool;

use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use session_pool::{BrowserLauncher, BrowserSession, SessionGuard, SessionPool};

use crate::config::{RenderSettings, TermDictionary};
use crate::discovery::{Candidate, DiscoveryError, DocumentKind, SourceStage, dedupe_candidates, rank_candidates};
use crate::link_extractor::{self, ExtractOptions};
use crate::utils::constants::{POST_CLICK_DELAY_MS, SETTLE_POLL_INTERVAL_MS};
use crate::utils::bounded_step;
use crate::hidden_content;

/// What one render pass produced. Failures never escape as `Err`; they are
/// carried in `error` alongside an empty candidate list.
#[derive(Debug, Default)]
pub struct RenderOutcome {
    pub candidates: Vec<Candidate>,
    /// Where the browser ended up after client-side redirects.
    pub final_url: Option<Url>,
    pub error: Option<DiscoveryError>,
    pub menu_clicks: usize,
    pub consent_clicks: u64,
}

impl RenderOutcome {
    fn failed(url: &Url, error: anyhow::Error) -> Self {
        let error = error.downcast::<DiscoveryError>().unwrap_or_else(|other| DiscoveryError::Render {
            url: url.to_string(),
            message: format!("{other:#}"),
        });
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Readiness {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    nodes: u64,
}

/// Shared, cheap to clone; all clones draw from the same session pool.
#[derive(Debug, Clone)]
pub struct DynamicRenderer {
    pool: SessionPool,
    settings: RenderSettings,
}

impl DynamicRenderer {
    #[must_use]
    pub fn new(pool: SessionPool, settings: RenderSettings) -> Self {
        Self { pool, settings }
    }

    #[must_use]
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render `url` and extract `kind` candidates from the live DOM.
    pub async fn render_and_extract(
        &self,
        url: &Url,
        kind: DocumentKind,
        options: &ExtractOptions<'_>,
    ) -> RenderOutcome {
        let started = Instant::now();
        let outcome = match self.render(url, kind, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(target: "policy_locator::renderer", "Render of {url} failed: {e:#}");
                RenderOutcome::failed(url, e)
            }
        };
        info!(
            target: "policy_locator::renderer",
            "Rendered {url} in {:?}: {} candidates, {} menu clicks",
            started.elapsed(),
            outcome.candidates.len(),
            outcome.menu_clicks
        );
        outcome
    }

    async fn render(&self, url: &Url, kind: DocumentKind, options: &ExtractOptions<'_>) -> Result<RenderOutcome> {
        let mut guard = self.pool.acquire().await?;
        let result = self.drive(guard.session()?, url, kind, options).await;
        guard.release().await;
        result
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        url: &Url,
        kind: DocumentKind,
        options: &ExtractOptions<'_>,
    ) -> Result<RenderOutcome> {
        bounded_step(url, "navigation", self.step_bound(), session.navigate(url.as_str())).await?;
        self.wait_until_settled(session).await;

        let consent_clicks = dismiss_consent(session, options.dictionary).await;
        if consent_clicks > 0 {
            debug!(target: "policy_locator::renderer", "Dismissed {consent_clicks} consent prompts on {url}");
            self.wait_until_settled(session).await;
        }

        let final_url = current_url(session).await.unwrap_or_else(|| url.clone());
        let mut candidates = self.rescan(session, &final_url, kind, options).await?;

        let mut menu_clicks = 0;
        while menu_clicks < self.settings.max_menu_clicks && !qualifies(&candidates, options.threshold) {
            let clicked = click_menu_toggle(session, options.dictionary, menu_clicks).await;
            menu_clicks += 1;
            if !clicked {
                break;
            }
            tokio::time::sleep(Duration::from_millis(POST_CLICK_DELAY_MS)).await;
            candidates.extend(self.rescan(session, &final_url, kind, options).await?);
        }

        let mut candidates = dedupe_candidates(candidates);
        rank_candidates(&mut candidates);
        Ok(RenderOutcome {
            candidates,
            final_url: Some(final_url),
            error: None,
            menu_clicks,
            consent_clicks,
        })
    }

    fn step_bound(&self) -> Duration {
        Duration::from_secs(self.settings.navigation_timeout_secs)
    }

    /// Poll readiness until the document is complete and the node count
    /// stops changing, or the settle bound runs out. Best effort.
    async fn wait_until_settled(&self, session: &mut dyn BrowserSession) {
        let deadline = Instant::now() + Duration::from_secs(self.settings.settle_timeout_secs);
        let mut last_nodes = None;

        while Instant::now() < deadline {
            let readiness = match session.evaluate(js_scripts::READINESS_SCRIPT).await {
                Ok(value) => parse_readiness(value),
                Err(e) => {
                    debug!(target: "policy_locator::renderer", "Readiness probe failed: {e}");
                    return;
                }
            };
            if readiness.ready && last_nodes == Some(readiness.nodes) {
                return;
            }
            last_nodes = Some(readiness.nodes);
            tokio::time::sleep(Duration::from_millis(SETTLE_POLL_INTERVAL_MS)).await;
        }
        debug!(target: "policy_locator::renderer", "Page did not settle within {}s", self.settings.settle_timeout_secs);
    }

    async fn rescan(
        &self,
        session: &mut dyn BrowserSession,
        base: &Url,
        kind: DocumentKind,
        options: &ExtractOptions<'_>,
    ) -> Result<Vec<Candidate>> {
        let html = bounded_step(base, "content", self.step_bound(), session.content()).await?;
        Ok(extract_rendered(&html, base, kind, options))
    }
}

/// Run the static and hidden-content analyses over rendered markup and
/// re-tag the results as render findings.
fn extract_rendered(html: &str, base: &Url, kind: DocumentKind, options: &ExtractOptions<'_>) -> Vec<Candidate> {
    link_extractor::extract(html, base, kind, options)
        .into_iter()
        .chain(hidden_content::scan(html, base, kind, options))
        .map(|candidate| {
            let rationale = format!("rendered DOM, {}", candidate.rationale());
            let restaged = Candidate::new(
                candidate.url().clone(),
                SourceStage::DynamicRender,
                candidate.confidence(),
                rationale,
            );
            match candidate.excerpt() {
                Some(excerpt) => restaged.with_excerpt(excerpt),
                None => restaged,
            }
        })
        .collect()
}

fn qualifies(candidates: &[Candidate], threshold: f64) -> bool {
    candidates.iter().any(|candidate| candidate.confidence() >= threshold)
}

/// A probe that cannot be decoded counts as ready so settling never hangs on it.
fn parse_readiness(value: Value) -> Readiness {
    serde_json::from_value(value).unwrap_or(Readiness { ready: true, nodes: 0 })
}

async fn current_url(session: &mut dyn BrowserSession) -> Option<Url> {
    match session.current_url().await {
        Ok(Some(raw)) => Url::parse(&raw).ok().filter(|url| matches!(url.scheme(), "http" | "https")),
        Ok(None) => None,
        Err(e) => {
            debug!(target: "policy_locator::renderer", "Could not read final URL: {e}");
            None
        }
    }
}

async fn dismiss_consent(session: &mut dyn BrowserSession, dictionary: &TermDictionary) -> u64 {
    if dictionary.consent_buttons.is_empty() {
        return 0;
    }
    let script = js_scripts::consent_script(&dictionary.consent_buttons);
    match session.evaluate(&script).await {
        Ok(value) => value.as_u64().unwrap_or(0),
        Err(e) => {
            debug!(target: "policy_locator::renderer", "Consent dismissal skipped: {e}");
            0
        }
    }
}

async fn click_menu_toggle(session: &mut dyn BrowserSession, dictionary: &TermDictionary, index: usize) -> bool {
    let script = js_scripts::menu_toggle_script(&dictionary.menu_toggles, index);
    match session.evaluate(&script).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            debug!(target: "policy_locator::renderer", "Menu toggle {index} failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;

    #[test]
    fn readiness_parsing_is_lenient() {
        let parsed = parse_readiness(serde_json::json!({"ready": false, "nodes": 42}));
        assert!(!parsed.ready);
        assert_eq!(parsed.nodes, 42);
        assert!(parse_readiness(Value::Null).ready);
    }

    #[test]
    fn rendered_candidates_are_restaged() {
        let config = DiscoveryConfig::default();
        let options = ExtractOptions::from_config(&config);
        let base = Url::parse("https://app.example.com/").unwrap();
        let html = r#"<html><body><footer><a href="/privacy">Privacy Policy</a></footer></body></html>"#;

        let candidates = extract_rendered(html, &base, DocumentKind::Privacy, &options);
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.source_stage() == SourceStage::DynamicRender));
        assert!(candidates[0].rationale().starts_with("rendered DOM"));
    }
}
