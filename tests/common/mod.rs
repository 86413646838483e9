//! Test utilities shared by the policy_locator integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use mockito::{Mock, Server};
use serde_json::Value;

use policy_locator::{BrowserLauncher, BrowserSession, DiscoveryConfig, DiscoveryConfigBuilder};

/// Builder with settings suited to a local mock server: no retries, short
/// timeouts, and rendering off unless a test turns it back on.
#[allow(dead_code)]
pub fn local_config() -> DiscoveryConfigBuilder {
    DiscoveryConfig::builder()
        .max_retries(0)
        .fetch_timeout_secs(5)
        .request_budget_secs(30)
        .render_enabled(false)
        .settle_timeout_secs(1)
}

/// Creates a test HTML document with specified content
#[allow(dead_code)]
pub fn create_test_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{}</title>
</head>
<body>
    {}
</body>
</html>"#,
        html_escape::encode_text(title),
        body
    )
}

/// A landing page with ordinary navigation and the given footer markup.
#[allow(dead_code)]
pub fn landing_page(footer: &str) -> String {
    create_test_html(
        "Acme Widgets",
        &format!(
            r#"<header><nav><a href="/">Home</a><a href="/products">Products</a><a href="/blog">Blog</a></nav></header>
    <main><h1>Widgets for everyone</h1><p>Buy our widgets.</p></main>
    <footer>{footer}</footer>"#
        ),
    )
}

/// Serves `html` at `path`
#[allow(dead_code)]
pub async fn create_html_mock(server: &mut Server, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}

/// Serves plain text (markdown files on a repository host)
#[allow(dead_code)]
pub async fn create_text_mock(server: &mut Server, path: &str, text: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body(text)
        .create_async()
        .await
}

/// Answers `from` with a 301 pointing at `to`
#[allow(dead_code)]
pub async fn create_redirect_mock(server: &mut Server, from: &str, to: &str) -> Mock {
    server
        .mock("GET", from)
        .with_status(301)
        .with_header("location", to)
        .create_async()
        .await
}

/// Creates a mock endpoint that returns an error
#[allow(dead_code)]
pub async fn create_error_mock(server: &mut Server, path: &str, status: usize) -> Mock {
    server
        .mock("GET", path)
        .with_status(status)
        .with_body("Error")
        .create_async()
        .await
}

// =============================================================================
// Scripted browser
// =============================================================================

/// Counters a test can inspect after the discoverer is done with the fakes.
#[derive(Debug, Default)]
pub struct BrowserStats {
    pub launches: AtomicUsize,
    pub navigations: AtomicUsize,
    pub teardowns: AtomicUsize,
}

#[allow(dead_code)]
impl BrowserStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Every navigation succeeds and the page serializes to this markup.
    Serve(String),
    /// Navigation never completes.
    Hang,
    /// Launching fails.
    FailLaunch,
}

pub struct FakeLauncher {
    behavior: FakeBehavior,
    stats: Arc<BrowserStats>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new(behavior: FakeBehavior) -> (Arc<Self>, Arc<BrowserStats>) {
        let stats = Arc::new(BrowserStats::default());
        let launcher = Arc::new(Self {
            behavior,
            stats: Arc::clone(&stats),
        });
        (launcher, stats)
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self) -> BoxFuture<'_, Result<Box<dyn BrowserSession>>> {
        Box::pin(async move {
            if matches!(self.behavior, FakeBehavior::FailLaunch) {
                return Err(anyhow!("no browser binary available"));
            }
            self.stats.launches.fetch_add(1, Ordering::SeqCst);
            let session: Box<dyn BrowserSession> = Box::new(FakeSession {
                behavior: self.behavior.clone(),
                stats: Arc::clone(&self.stats),
                url: None,
                torn_down: false,
            });
            Ok(session)
        })
    }
}

struct FakeSession {
    behavior: FakeBehavior,
    stats: Arc<BrowserStats>,
    url: Option<String>,
    torn_down: bool,
}

impl BrowserSession for FakeSession {
    fn navigate<'a>(&'a mut self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.stats.navigations.fetch_add(1, Ordering::SeqCst);
            if matches!(self.behavior, FakeBehavior::Hang) {
                futures::future::pending::<()>().await;
            }
            self.url = Some(url.to_string());
            Ok(())
        })
    }

    fn evaluate<'a>(&'a mut self, _script: &'a str) -> BoxFuture<'a, Result<Value>> {
        // Null reads as "ready", zero consent clicks and no menu toggle.
        Box::pin(async { Ok(Value::Null) })
    }

    fn content(&mut self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            match &self.behavior {
                FakeBehavior::Serve(html) => Ok(html.clone()),
                _ => Err(anyhow!("no document loaded")),
            }
        })
    }

    fn current_url(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { Ok(self.url.clone()) })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn teardown(&mut self) {
        if !self.torn_down {
            self.torn_down = true;
            self.stats.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}
