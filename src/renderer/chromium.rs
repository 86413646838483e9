//! Chromium-backed [`BrowserSession`] via chromiumoxide.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::future::BoxFuture;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::session_pool::{BrowserLauncher, BrowserSession};
use crate::browser_setup::{apply_stealth_measures, launch_browser};
use crate::config::RenderSettings;

/// Launches one headless Chromium per session, each with a throwaway profile.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            headless: settings.headless,
            request_timeout: Duration::from_secs(settings.navigation_timeout_secs.max(1)),
        }
    }
}

impl BrowserLauncher for ChromiumLauncher {
    fn launch(&self) -> BoxFuture<'_, Result<Box<dyn BrowserSession>>> {
        Box::pin(async move {
            let profile_dir =
                std::env::temp_dir().join(format!("policy_locator_{}", uuid::Uuid::new_v4()));
            let launched = launch_browser(self.headless, profile_dir, self.request_timeout).await?;

            // From here on the session owns cleanup, including on the error paths below.
            let mut session = ChromiumSession {
                browser: Some(launched.browser),
                handler: launched.handler,
                page: None,
                user_data_dir: Some(launched.profile_dir),
            };

            let page = session
                .browser()?
                .new_page("about:blank")
                .await
                .context("Failed to open blank page")?;
            if let Err(e) = apply_stealth_measures(&page).await {
                debug!(target: "policy_locator::renderer", "Stealth injection skipped: {e}");
            }
            session.page = Some(page);

            Ok(Box::new(session) as Box<dyn BrowserSession>)
        })
    }
}

pub struct ChromiumSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    page: Option<Page>,
    user_data_dir: Option<PathBuf>,
}

impl ChromiumSession {
    fn browser(&self) -> Result<&Browser> {
        self.browser.as_ref().context("browser already closed")
    }

    fn page(&self) -> Result<&Page> {
        self.page.as_ref().context("no page open")
    }

    /// Remove the profile directory. Chrome must have exited first or
    /// locked files survive (notably on Windows).
    fn cleanup_profile_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take()
            && let Err(e) = std::fs::remove_dir_all(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                target: "policy_locator::renderer",
                "Failed to remove browser profile {}: {e}",
                path.display()
            );
        }
    }
}

impl BrowserSession for ChromiumSession {
    fn navigate<'a>(&'a mut self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let page = self.page()?;
            page.goto(url).await.with_context(|| format!("Failed to navigate to {url}"))?;
            Ok(())
        })
    }

    fn evaluate<'a>(&'a mut self, script: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let result = self.page()?.evaluate(script).await.context("Script evaluation failed")?;
            Ok(result.into_value::<Value>().unwrap_or(Value::Null))
        })
    }

    fn content(&mut self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { self.page()?.content().await.context("Failed to read page content") })
    }

    fn current_url(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { self.page()?.url().await.context("Failed to read page URL") })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.page = None;
            if let Some(mut browser) = self.browser.take() {
                if let Err(e) = browser.close().await {
                    warn!(target: "policy_locator::renderer", "Failed to close browser cleanly: {e}");
                }
                if let Err(e) = browser.wait().await {
                    warn!(target: "policy_locator::renderer", "Failed to wait for browser exit: {e}");
                }
            }
            self.handler.abort();
            self.cleanup_profile_dir();
            Ok(())
        })
    }

    fn teardown(&mut self) {
        self.page = None;
        // Dropping the Browser kills the child process.
        self.browser = None;
        self.handler.abort();
        self.cleanup_profile_dir();
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
