//! Static HTTP fetcher
//!
//! Plain GET with a browser-like request profile. Redirects are followed by
//! hand so the hop chain is observable and bounded; every outcome, success or
//! not, comes back as a [`FetchResult`] rather than an error.

use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchSettings;
use crate::discovery::DiscoveryError;
use crate::utils::constants::{BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE, MAX_BODY_BYTES};

/// Outcome classification for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    HttpError(u16),
    NetworkError(String),
    /// Anti-bot refusal; carries the HTTP status that triggered it.
    Blocked(u16),
    RateLimited,
    Timeout,
}

impl FetchStatus {
    /// Classify a final (non-redirect) HTTP status.
    #[must_use]
    pub fn from_http(status: u16, body_hint: Option<&str>) -> Self {
        match status {
            200..=299 => Self::Ok,
            429 => Self::RateLimited,
            400 | 401 | 403 | 406 | 451 | 999 => Self::Blocked(status),
            503 if body_hint.is_some_and(looks_like_challenge) => Self::Blocked(status),
            other => Self::HttpError(other),
        }
    }

    /// Worth retrying: the same request may well succeed a moment later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::Timeout | Self::HttpError(502..=504)
        )
    }

    /// One-line, user-facing explanation of the failure.
    #[must_use]
    pub fn explain(&self) -> String {
        match self {
            Self::Ok => "page fetched".to_string(),
            Self::Blocked(403) => {
                "the site returned 403 Forbidden, which usually means automated access is blocked"
                    .to_string()
            }
            Self::Blocked(400) => {
                "the site returned 400 Bad Request, a common response to scrapers".to_string()
            }
            Self::Blocked(401) => "the site requires authentication (401)".to_string(),
            Self::Blocked(code) => format!("the site refused automated access (HTTP {code})"),
            Self::RateLimited => "the site is rate limiting requests (429)".to_string(),
            Self::HttpError(404) => "the page does not exist (404)".to_string(),
            Self::HttpError(code) if *code >= 500 => {
                format!("the site had a server error (HTTP {code})")
            }
            Self::HttpError(code) => format!("the site answered HTTP {code}"),
            Self::NetworkError(message) => format!("the site could not be reached: {message}"),
            Self::Timeout => "the site did not respond in time".to_string(),
        }
    }
}

fn looks_like_challenge(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("cf-chl")
        || lower.contains("attention required")
        || lower.contains("captcha")
        || lower.contains("just a moment...")
}

/// What one fetch produced.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub requested_url: Url,
    pub status: FetchStatus,
    /// Last URL reached; equals `requested_url` when no redirect happened.
    pub final_url: Url,
    /// Decoded body for textual responses with a 2xx status.
    pub html_body: Option<String>,
    /// Every URL visited before `final_url`, starting with `requested_url`.
    pub redirect_chain: Vec<Url>,
    /// A redirect led to a URL the caller had already fetched. `final_url` is
    /// that URL, no request was sent for it and `status`/`html_body` are left
    /// for the caller to fill from what it already holds.
    pub rejoined: bool,
}

impl FetchResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }

    /// The equivalent error variant, or `None` on success.
    #[must_use]
    pub fn to_error(&self) -> Option<DiscoveryError> {
        let url = self.requested_url.to_string();
        match &self.status {
            FetchStatus::Ok => None,
            FetchStatus::HttpError(code) => Some(DiscoveryError::Network {
                url,
                message: format!("HTTP {code}"),
            }),
            FetchStatus::NetworkError(message) => Some(DiscoveryError::Network {
                url,
                message: message.clone(),
            }),
            FetchStatus::Blocked(status) => Some(DiscoveryError::Blocked {
                url,
                status: *status,
            }),
            FetchStatus::RateLimited => Some(DiscoveryError::RateLimited { url }),
            FetchStatus::Timeout => Some(DiscoveryError::Timeout { url }),
        }
    }

    fn failed(requested_url: &Url, chain: Vec<Url>, final_url: Url, status: FetchStatus) -> Self {
        Self {
            requested_url: requested_url.clone(),
            status,
            final_url,
            html_body: None,
            redirect_chain: chain,
            rejoined: false,
        }
    }
}

/// Shared, cheaply clonable HTTP fetcher.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl StaticFetcher {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
        headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// GET `url`, retrying transient failures with exponential backoff.
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        self.fetch_unvisited(url, |_| false).await
    }

    /// Like [`Self::fetch`], but redirect hops for which `visited` holds are
    /// not requested again; the chain stops there with `rejoined` set.
    pub async fn fetch_unvisited<F>(&self, url: &Url, visited: F) -> FetchResult
    where
        F: Fn(&Url) -> bool,
    {
        let mut attempt = 0;
        loop {
            let result = self.fetch_once(url, &visited).await;
            if !result.status.is_transient() || attempt >= self.settings.max_retries {
                return result;
            }

            let delay = backoff_delay_ms(self.settings.retry_base_delay_ms, attempt);
            warn!(
                target: "policy_locator::fetch",
                "Transient failure for {url} ({:?}), attempt {}/{}, retrying in {delay}ms",
                result.status,
                attempt + 1,
                self.settings.max_retries
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    async fn fetch_once<F>(&self, url: &Url, visited: &F) -> FetchResult
    where
        F: Fn(&Url) -> bool,
    {
        let mut current = url.clone();
        let mut chain: Vec<Url> = Vec::new();

        loop {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) => {
                    let status = classify_transport_error(&e);
                    debug!(target: "policy_locator::fetch", "GET {current} failed: {e}");
                    return FetchResult::failed(url, chain, current, status);
                }
            };

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| current.join(value).ok());
                let Some(next) = location else {
                    return FetchResult::failed(
                        url,
                        chain,
                        current,
                        FetchStatus::NetworkError(format!("redirect {status} without usable Location")),
                    );
                };

                chain.push(current);
                if chain.len() > self.settings.max_redirects {
                    return FetchResult::failed(
                        url,
                        chain,
                        next,
                        FetchStatus::NetworkError(format!(
                            "more than {} redirects",
                            self.settings.max_redirects
                        )),
                    );
                }
                if chain.contains(&next) {
                    return FetchResult::failed(
                        url,
                        chain,
                        next,
                        FetchStatus::NetworkError("redirect loop".to_string()),
                    );
                }
                if visited(&next) {
                    debug!(target: "policy_locator::fetch", "Redirect {status} -> {next}, already fetched");
                    return FetchResult {
                        requested_url: url.clone(),
                        status: FetchStatus::Ok,
                        final_url: next,
                        html_body: None,
                        redirect_chain: chain,
                        rejoined: true,
                    };
                }
                debug!(target: "policy_locator::fetch", "Redirect {status} -> {next}");
                current = next;
                continue;
            }

            let code = status.as_u16();
            let textual = is_textual(response.headers());
            let body = match read_capped_body(response).await {
                Ok(body) => body,
                Err(e) => {
                    let status = classify_transport_error(&e);
                    return FetchResult::failed(url, chain, current, status);
                }
            };

            let fetch_status = FetchStatus::from_http(code, Some(&body));
            debug!(
                target: "policy_locator::fetch",
                "GET {current} -> {code} ({} bytes, {:?})",
                body.len(),
                fetch_status
            );

            let html_body = (fetch_status == FetchStatus::Ok && textual).then_some(body);
            return FetchResult {
                requested_url: url.clone(),
                status: fetch_status,
                final_url: current,
                html_body,
                redirect_chain: chain,
                rejoined: false,
            };
        }
    }
}

/// Exponential backoff with up to one base delay of random jitter.
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=base_ms.max(1));
    base_ms.saturating_mul(factor).saturating_add(jitter)
}

fn classify_transport_error(error: &reqwest::Error) -> FetchStatus {
    if error.is_timeout() {
        FetchStatus::Timeout
    } else {
        FetchStatus::NetworkError(error.to_string())
    }
}

fn is_textual(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_none_or(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/") || ct.contains("html") || ct.contains("xml") || ct.contains("json")
        })
}

async fn read_capped_body(response: reqwest::Response) -> Result<String, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = MAX_BODY_BYTES.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buffer.len() >= MAX_BODY_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_anti_bot_statuses() {
        assert_eq!(FetchStatus::from_http(403, None), FetchStatus::Blocked(403));
        assert_eq!(FetchStatus::from_http(400, None), FetchStatus::Blocked(400));
        assert_eq!(FetchStatus::from_http(429, None), FetchStatus::RateLimited);
        assert_eq!(FetchStatus::from_http(404, None), FetchStatus::HttpError(404));
        assert_eq!(
            FetchStatus::from_http(503, Some("<title>Just a moment...</title>")),
            FetchStatus::Blocked(503)
        );
        assert_eq!(FetchStatus::from_http(503, Some("maintenance")), FetchStatus::HttpError(503));
    }

    #[test]
    fn backoff_grows_and_never_overflows() {
        let first = backoff_delay_ms(500, 0);
        assert!((500..=1000).contains(&first), "{first}");
        let third = backoff_delay_ms(500, 2);
        assert!((2000..=2500).contains(&third), "{third}");
        assert_eq!(backoff_delay_ms(u64::MAX, 70), u64::MAX);
    }

    #[test]
    fn transient_statuses() {
        assert!(FetchStatus::Timeout.is_transient());
        assert!(FetchStatus::HttpError(503).is_transient());
        assert!(!FetchStatus::HttpError(404).is_transient());
        assert!(!FetchStatus::Blocked(403).is_transient());
    }
}
