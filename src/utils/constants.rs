//! Shared configuration constants for policy discovery
//!
//! Default values used by [`crate::config::DiscoveryConfig`]. Every numeric
//! threshold and multiplier here is a tuning choice, not a contract; callers
//! override them through the config layer.

/// Minimum confidence a candidate needs before the engine resolves on it.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Wall-clock budget for one discovery request, covering every stage.
pub const DEFAULT_REQUEST_BUDGET_SECS: u64 = 90;

/// Per-request timeout for static fetches.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Maximum redirect hops followed by the static fetcher.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Retries for transient fetch failures (network errors, timeouts, 502-504).
pub const DEFAULT_FETCH_RETRIES: u32 = 1;

/// Base delay for exponential backoff between fetch retries.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Largest accepted `fetch.max_retries`.
pub const MAX_FETCH_RETRIES: u32 = 5;

/// Largest accepted `fetch.retry_base_delay_ms`.
pub const MAX_RETRY_BASE_DELAY_MS: u64 = 30_000;

/// Response bodies are truncated past this many bytes.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Browser navigation timeout.
///
/// Heavy single-page apps routinely need 20s+ before the first paint on
/// cold caches, so this sits in the upper half of the 30-45s window.
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 35;

/// Upper bound for the DOM-stable wait after navigation completes.
pub const DEFAULT_SETTLE_TIMEOUT_SECS: u64 = 10;

/// Interval between readiness polls while waiting for the DOM to settle.
pub const SETTLE_POLL_INTERVAL_MS: u64 = 500;

/// Pause after a consent or menu click before re-reading the DOM.
pub const POST_CLICK_DELAY_MS: u64 = 1000;

/// Menu-toggle clicks attempted per render before giving up.
pub const DEFAULT_MAX_MENU_CLICKS: usize = 5;

/// Hard ceiling on menu-toggle clicks; exploration past this is never useful.
pub const MAX_MENU_CLICKS: usize = 5;

/// Concurrent headless sessions allowed process-wide.
pub const DEFAULT_MAX_BROWSER_SESSIONS: usize = 2;

/// Distinct URLs the renderer will load per request (resolved page, then root).
pub const DEFAULT_MAX_RENDER_TARGETS: usize = 2;

/// Characters kept from a content-as-document section.
pub const MAX_EXCERPT_CHARS: usize = 4000;

/// Chrome user agent string for stealth mode
///
/// Shared by the static fetcher and the headless browser so both present
/// the same client to the site.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// `Accept` header sent with static fetches.
pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// `Accept-Language` header sent with static fetches.
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
