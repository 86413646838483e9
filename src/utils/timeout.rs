//! Bounded browser steps
//!
//! Each await on the headless browser runs under its own bound. An overrun
//! and a failure both come back as [`DiscoveryError::Render`] naming the
//! step, which is what the exhaustion message later shows the caller.

use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::discovery::DiscoveryError;

/// Run one browser `step` against `url`, giving up after `bound`.
pub async fn bounded_step<F, T>(url: &Url, step: &str, bound: Duration, operation: F) -> Result<T, DiscoveryError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let message = match tokio::time::timeout(bound, operation).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => format!("{step} failed: {e:#}"),
        Err(_) => format!("{step} did not finish within {}s", bound.as_secs()),
    };
    Err(DiscoveryError::Render {
        url: url.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://app.example.com/").unwrap()
    }

    #[tokio::test]
    async fn overrun_names_the_step() {
        let err = bounded_step(&page(), "navigation", Duration::ZERO, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        match err {
            DiscoveryError::Render { url, message } => {
                assert_eq!(url, "https://app.example.com/");
                assert_eq!(message, "navigation did not finish within 0s");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_keeps_the_cause() {
        let err = bounded_step::<_, ()>(&page(), "content", Duration::from_secs(1), async {
            Err(anyhow::anyhow!("target closed"))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("content failed: target closed"), "{err}");
    }

    #[tokio::test]
    async fn value_passes_through() {
        let nodes = bounded_step(&page(), "readiness", Duration::from_secs(1), async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(nodes, 42);
    }
}
