//! Error taxonomy for discovery requests
//!
//! Only [`DiscoveryError::InvalidUrl`] ever crosses the public
//! [`Discoverer::discover`](super::Discoverer::discover) boundary. Every other
//! variant is recorded on the request and folded into a `found = false`
//! response with an explanation.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Input could not be turned into an http(s) URL with a host.
    #[error("invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The site answered with an anti-bot status.
    #[error("access to {url} blocked (HTTP {status})")]
    Blocked { url: String, status: u16 },

    #[error("rate limited by {url}")]
    RateLimited { url: String },

    #[error("render failed for {url}: {message}")]
    Render { url: String, message: String },

    /// Terminal negative result, not a fault.
    #[error("no {kind} link found")]
    NoLinksFound { kind: String },
}

impl DiscoveryError {
    pub(crate) fn invalid_url(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the engine may fall back to another stage or URL after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl { .. })
    }

    /// Whether the site actively refused us, as opposed to being unreachable.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Blocked { .. } | Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_url_is_fatal() {
        assert!(!DiscoveryError::invalid_url("", "empty").is_recoverable());
        assert!(
            DiscoveryError::Blocked {
                url: "https://example.com/".into(),
                status: 403
            }
            .is_recoverable()
        );
        assert!(
            DiscoveryError::RateLimited {
                url: "https://example.com/".into()
            }
            .is_access_denied()
        );
    }
}
