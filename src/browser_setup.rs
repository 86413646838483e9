//! Locating, downloading and launching Chromium for the dynamic renderer.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::handler::Handler;
use futures::StreamExt;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::utils::constants::CHROME_USER_AGENT;

/// Environment variable that pins the browser executable.
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

/// Executable names looked up on `PATH`.
#[cfg(windows)]
const PATH_NAMES: &[&str] = &["chrome.exe", "chromium.exe"];
#[cfg(not(windows))]
const PATH_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Flags that make the headless browser look like an ordinary desktop Chrome
/// and keep it from wandering off doing background work.
const LAUNCH_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-background-networking",
    "--disable-breakpad",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--password-store=basic",
    "--use-mock-keychain",
    "--hide-scrollbars",
    "--mute-audio",
];

const STEALTH_JS: &str = r"
    Object.defineProperty(navigator, 'webdriver', { get: () => false });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    if (!window.chrome) { window.chrome = {}; }
    if (!window.chrome.runtime) { window.chrome.runtime = {}; }
";

/// A running browser and what must be cleaned up with it.
pub struct LaunchedBrowser {
    pub browser: Browser,
    /// CDP event pump; abort it on teardown.
    pub handler: JoinHandle<()>,
    /// Throwaway profile; remove it once the process has exited.
    pub profile_dir: PathBuf,
}

/// Find a Chrome/Chromium executable: `CHROMIUM_PATH`, then the platform's
/// install locations, then `PATH`.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Some(pinned) = std::env::var_os(CHROMIUM_PATH_ENV).map(PathBuf::from) {
        if pinned.is_file() {
            info!(target: "policy_locator::browser", "Using browser from {CHROMIUM_PATH_ENV}: {}", pinned.display());
            return Ok(pinned);
        }
        warn!(
            target: "policy_locator::browser",
            "{CHROMIUM_PATH_ENV} points to a missing file: {}",
            pinned.display()
        );
    }

    let installed = install_locations().into_iter().find(|path| path.is_file());
    let found = installed.or_else(|| {
        std::env::var_os("PATH").and_then(|path_var| search_path(&path_var, PATH_NAMES))
    });

    match found {
        Some(path) => {
            debug!(target: "policy_locator::browser", "Found browser at {}", path.display());
            Ok(path)
        }
        None => Err(anyhow::anyhow!("Chrome/Chromium executable not found")),
    }
}

/// Conventional install locations for the current platform, most common first.
fn install_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if cfg!(windows) {
        for base in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Some(dir) = std::env::var_os(base).map(PathBuf::from) {
                locations.push(dir.join(r"Google\Chrome\Application\chrome.exe"));
                locations.push(dir.join(r"Chromium\Application\chrome.exe"));
            }
        }
    } else if cfg!(target_os = "macos") {
        const BUNDLES: &[&str] = &[
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "Chromium.app/Contents/MacOS/Chromium",
        ];
        let roots = std::iter::once(PathBuf::from("/Applications"))
            .chain(dirs::home_dir().map(|home| home.join("Applications")));
        for root in roots {
            locations.extend(BUNDLES.iter().map(|bundle| root.join(bundle)));
        }
        locations.push(PathBuf::from("/opt/homebrew/bin/chromium"));
    } else {
        locations.extend(
            [
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/snap/bin/chromium",
                "/usr/local/bin/chromium",
                "/opt/google/chrome/chrome",
            ]
            .map(PathBuf::from),
        );
    }

    locations
}

/// First `names` entry present in a `PATH`-style directory list. Directories
/// win over names, as a shell would resolve them.
fn search_path(path_var: &OsStr, names: &[&str]) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn managed_browser_dir() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| {
        let fallback = std::env::temp_dir();
        warn!(
            target: "policy_locator::browser",
            "No user cache directory, downloading Chromium under {}",
            fallback.display()
        );
        fallback
    });
    base.join("policy_locator").join("chromium")
}

/// Download a managed Chromium into the user cache directory and return the
/// executable path. Reuses an earlier download when present.
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = managed_browser_dir();
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;

    info!(target: "policy_locator::browser", "Fetching managed Chromium into {}", cache_dir.display());
    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("Invalid browser fetcher options")?;
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Failed to download Chromium")?;
    Ok(installation.executable_path)
}

/// Launch a browser on a fresh profile directory.
pub async fn launch_browser(headless: bool, profile_dir: PathBuf, request_timeout: Duration) -> Result<LaunchedBrowser> {
    let executable = match find_browser_executable() {
        Ok(path) => path,
        Err(e) => {
            info!(target: "policy_locator::browser", "{e}; falling back to a managed download");
            download_managed_browser().await?
        }
    };

    tokio::fs::create_dir_all(&profile_dir)
        .await
        .with_context(|| format!("Failed to create browser profile {}", profile_dir.display()))?;

    let builder = BrowserConfigBuilder::default()
        .chrome_executable(executable)
        .user_data_dir(profile_dir.clone())
        .request_timeout(request_timeout)
        .window_size(1366, 900)
        .arg(format!("--user-agent={CHROME_USER_AGENT}"));
    let builder = LAUNCH_FLAGS.iter().fold(builder, |builder, flag| builder.arg(*flag));
    let builder = if headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid browser config: {e}"))?;

    debug!(target: "policy_locator::browser", "Launching browser on profile {}", profile_dir.display());
    let (browser, handler) = Browser::launch(config).await.context("Failed to launch browser")?;

    Ok(LaunchedBrowser {
        browser,
        handler: spawn_event_pump(handler),
        profile_dir,
    })
}

/// Drive the CDP connection until the browser goes away.
fn spawn_event_pump(mut handler: Handler) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(event) = handler.next().await {
            match event {
                Ok(()) => {}
                Err(e) if is_decode_noise(&e.to_string()) => {
                    trace!(target: "policy_locator::browser", "Ignored CDP decode error: {e}");
                }
                Err(e) => error!(target: "policy_locator::browser", "Browser handler error: {e:?}"),
            }
        }
        debug!(target: "policy_locator::browser", "Browser event pump finished");
    })
}

/// chromiumoxide cannot decode some newer CDP events; those errors are harmless.
fn is_decode_noise(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// Hide the most common automation tells before the first navigation.
pub async fn apply_stealth_measures(page: &chromiumoxide::Page) -> Result<()> {
    page.execute(
        chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
            source: STEALTH_JS.to_string(),
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        },
    )
    .await
    .context("Failed to install stealth script")?;
    Ok(())
}
