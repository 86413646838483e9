//! Bounded pool of isolated browser sessions
//!
//! Each acquire launches a fresh session (no state survives between requests)
//! under a semaphore permit. The returned guard tears the session down on
//! every exit path: explicit [`SessionGuard::release`], early return, error,
//! or cancellation by the request budget.

use anyhow::{Context, Result, anyhow};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

// =============================================================================
// Session seams
// =============================================================================

/// One isolated browsing context with a single page.
pub trait BrowserSession: Send {
    fn navigate<'a>(&'a mut self, url: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Evaluate a script and return its JSON value (`Null` for `undefined`).
    fn evaluate<'a>(&'a mut self, script: &'a str) -> BoxFuture<'a, Result<Value>>;

    /// Serialized DOM of the current page.
    fn content(&mut self) -> BoxFuture<'_, Result<String>>;

    fn current_url(&mut self) -> BoxFuture<'_, Result<Option<String>>>;

    /// Graceful shutdown.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Synchronous, idempotent teardown of whatever `close` could not reach.
    /// Called from `Drop`, so it must not block on async work.
    fn teardown(&mut self);
}

/// Creates sessions. The production launcher drives Chromium; tests plug in
/// scripted fakes.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> BoxFuture<'_, Result<Box<dyn BrowserSession>>>;
}

// =============================================================================
// Pool
// =============================================================================

#[derive(Clone)]
pub struct SessionPool {
    launcher: Arc<dyn BrowserLauncher>,
    permits: Arc<Semaphore>,
    /// Sessions launched and not yet torn down.
    live: Arc<AtomicUsize>,
    launched: Arc<AtomicU64>,
    max_sessions: usize,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("max_sessions", &self.max_sessions)
            .field("live", &self.live_sessions())
            .field("launched", &self.total_launched())
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, max_sessions: usize) -> Self {
        let max_sessions = max_sessions.max(1);
        Self {
            launcher,
            permits: Arc::new(Semaphore::new(max_sessions)),
            live: Arc::new(AtomicUsize::new(0)),
            launched: Arc::new(AtomicU64::new(0)),
            max_sessions,
        }
    }

    /// Wait for a free slot, then launch a session into it.
    ///
    /// A failed launch gives the slot back immediately.
    pub async fn acquire(&self) -> Result<SessionGuard> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .context("session pool is closed")?;

        let session = self.launcher.launch().await.context("browser launch failed")?;
        let id = self.launched.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(target: "policy_locator::renderer", "Acquired browser session {id}");

        Ok(SessionGuard {
            id,
            session: Some(session),
            live: Arc::clone(&self.live),
            _permit: permit,
        })
    }

    /// Sessions currently alive (launched and not torn down).
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Sessions launched over the pool's lifetime.
    #[must_use]
    pub fn total_launched(&self) -> u64 {
        self.launched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

// =============================================================================
// RAII Guard
// =============================================================================

/// Owns a live session and its pool slot.
pub struct SessionGuard {
    id: u64,
    session: Option<Box<dyn BrowserSession>>,
    live: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl SessionGuard {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| anyhow!("browser session {} already released", self.id))
    }

    /// Close gracefully, then tear down. If this future is dropped half-way
    /// the guard's `Drop` still finishes the job.
    pub async fn release(mut self) {
        if let Some(session) = self.session.as_mut()
            && let Err(e) = session.close().await
        {
            warn!(target: "policy_locator::renderer", "Browser session {} did not close cleanly: {e}", self.id);
        }
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.teardown();
            self.live.fetch_sub(1, Ordering::SeqCst);
            debug!(target: "policy_locator::renderer", "Released browser session {}", self.id);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(
                target: "policy_locator::renderer",
                "Browser session {} dropped without release, tearing down",
                self.id
            );
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct NullSession {
        torn_down: Arc<AtomicBool>,
    }

    impl BrowserSession for NullSession {
        fn navigate<'a>(&'a mut self, _url: &'a str) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }
        fn evaluate<'a>(&'a mut self, _script: &'a str) -> BoxFuture<'a, Result<Value>> {
            Box::pin(async { Ok(Value::Null) })
        }
        fn content(&mut self) -> BoxFuture<'_, Result<String>> {
            Box::pin(async { Ok(String::new()) })
        }
        fn current_url(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
            Box::pin(async { Ok(None) })
        }
        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
        fn teardown(&mut self) {
            self.torn_down.store(true, Ordering::SeqCst);
        }
    }

    struct NullLauncher {
        torn_down: Arc<AtomicBool>,
    }

    impl BrowserLauncher for NullLauncher {
        fn launch(&self) -> BoxFuture<'_, Result<Box<dyn BrowserSession>>> {
            let torn_down = Arc::clone(&self.torn_down);
            Box::pin(async move { Ok(Box::new(NullSession { torn_down }) as Box<dyn BrowserSession>) })
        }
    }

    #[tokio::test]
    async fn dropped_guard_tears_down_and_frees_slot() {
        let torn_down = Arc::new(AtomicBool::new(false));
        let pool = SessionPool::new(
            Arc::new(NullLauncher {
                torn_down: Arc::clone(&torn_down),
            }),
            1,
        );

        let guard = pool.acquire().await.unwrap();
        assert_eq!(pool.live_sessions(), 1);
        drop(guard);

        assert!(torn_down.load(Ordering::SeqCst));
        assert_eq!(pool.live_sessions(), 0);
        // The single slot is free again.
        let guard = pool.acquire().await.unwrap();
        guard.release().await;
        assert_eq!(pool.live_sessions(), 0);
        assert_eq!(pool.total_launched(), 2);
    }
}
