//! Locate a website's Terms of Service or Privacy Policy.
//!
//! [`Discoverer::discover`] takes a loosely formatted URL and a
//! [`DocumentKind`] and walks a sequence of increasingly expensive strategies
//! (site-type specializers, static link scoring, hidden-content scanning,
//! conventional path probing, headless rendering) until one produces a
//! verified, high-confidence answer or every strategy is exhausted.

pub mod browser_setup;
pub mod config;
pub mod discovery;
pub mod fetcher;
pub mod hidden_content;
pub mod link_extractor;
pub mod normalizer;
pub mod renderer;
pub mod specializer;
pub mod utils;

pub use browser_setup::{
    LaunchedBrowser, apply_stealth_measures, download_managed_browser, find_browser_executable,
    launch_browser,
};
pub use config::{ConfigError, DiscoveryConfig, DiscoveryConfigBuilder, TermDictionary};
pub use discovery::{
    AppDetails, Candidate, Discoverer, DiscoveryError, DiscoveryResponse, DocumentKind,
    ResultSink, SourceStage,
};
pub use fetcher::{FetchResult, FetchStatus, StaticFetcher};
pub use renderer::{BrowserLauncher, BrowserSession, ChromiumLauncher, SessionPool};

/// One-shot convenience: build a [`Discoverer`] from `config` and run a
/// single request.
pub async fn discover(
    config: DiscoveryConfig,
    kind: DocumentKind,
    input: &str,
) -> anyhow::Result<DiscoveryResponse> {
    let discoverer = Discoverer::new(config)?;
    Ok(discoverer.discover(kind, input).await?)
}
