//! Code repository specializer
//!
//! Repositories keep legal text in files rather than linked pages. Evidence is
//! tried strongest first: a dedicated policy file, a README link, then a
//! `SECURITY.md`/`README.md` section whose heading names the document, which
//! is returned as the document itself.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::config::TermDictionary;
use crate::discovery::request::DiscoveryRequest;
use crate::discovery::{Candidate, DocumentKind, SourceStage, dedupe_candidates, rank_candidates};
use crate::fetcher::StaticFetcher;
use crate::link_extractor::scoring::{TextMatch, match_text};
use crate::link_extractor::{ElementContext, ExtractOptions, LinkScorer};
use crate::utils::constants::MAX_EXCERPT_CHARS;
use crate::utils::{collapse_whitespace, host_matches_domain, normalize_label, origin_string, safe_truncate_chars};

const PRIVACY_FILES: &[&str] = &[
    "PRIVACY.md",
    "PRIVACY_POLICY.md",
    "privacy-policy.md",
    "docs/PRIVACY.md",
    ".github/PRIVACY.md",
];

const TERMS_FILES: &[&str] = &[
    "TERMS.md",
    "TERMS_OF_SERVICE.md",
    "terms-of-service.md",
    "docs/TERMS.md",
];

const README_FILES: &[&str] = &["README.md", "readme.md", "README"];

/// First path segments that are site pages, not owners.
const RESERVED_OWNERS: &[&str] = &[
    "about", "explore", "features", "login", "marketplace", "orgs", "pricing", "settings",
    "site", "sponsors", "topics", "users", "-", "help", "dashboard", "search",
];

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\]\n]{1,200})\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("valid markdown link regex")
});

static REFERENCE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s{0,3}\[([^\]\n]{1,200})\]:\s*<?(\S+?)>?\s*$").expect("valid reference link regex")
});

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid heading regex"));

/// A repository identified by host, owner and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// `scheme://host[:port]` of the hosting service.
    pub origin: Url,
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// `/owner/repo[/...]` on one of `hosts`.
    #[must_use]
    pub fn from_url(url: &Url, hosts: &[String]) -> Option<Self> {
        let host = url.host_str()?;
        if !hosts.iter().any(|known| host_matches_domain(host, known)) {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?.trim_end_matches(".git");
        if repo.is_empty() || RESERVED_OWNERS.contains(&owner.to_ascii_lowercase().as_str()) {
            return None;
        }

        Some(Self {
            origin: Url::parse(&origin_string(url)).ok()?,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn host(&self) -> &str {
        self.origin.host_str().unwrap_or_default()
    }

    fn base(&self) -> String {
        format!("{}/{}/{}", origin_string(&self.origin), self.owner, self.repo)
    }

    /// Raw-content URL of a file on the default branch.
    #[must_use]
    pub fn raw_file_url(&self, file: &str) -> Option<Url> {
        let file = file.trim_start_matches("./").trim_start_matches('/');
        let raw = if host_matches_domain(self.host(), "github.com") {
            format!("https://raw.githubusercontent.com/{}/{}/HEAD/{file}", self.owner, self.repo)
        } else if self.host().contains("gitlab") {
            format!("{}/-/raw/HEAD/{file}", self.base())
        } else {
            format!("{}/raw/HEAD/{file}", self.base())
        };
        Url::parse(&raw).ok()
    }

    /// URL prefixes that belong to this repository rather than the host.
    #[must_use]
    pub fn own_prefixes(&self) -> Vec<String> {
        let mut prefixes = vec![format!("{}/", self.base())];
        if host_matches_domain(self.host(), "github.com") {
            prefixes.push(format!("https://raw.githubusercontent.com/{}/{}/", self.owner, self.repo));
        }
        prefixes
    }
}

/// Dedicated legal files for a kind, most conventional first.
#[must_use]
pub fn policy_files(kind: DocumentKind) -> &'static [&'static str] {
    match kind {
        DocumentKind::Privacy => PRIVACY_FILES,
        DocumentKind::Terms => TERMS_FILES,
    }
}

/// Run the repository strategy. Returns as soon as one level of evidence
/// produces a qualifying candidate.
pub async fn discover(
    repo: &RepoRef,
    request: &mut DiscoveryRequest,
    fetcher: &StaticFetcher,
    options: &ExtractOptions<'_>,
) -> Vec<Candidate> {
    let kind = request.kind();
    info!(
        target: "policy_locator::specializer",
        "Repository {}/{}: looking for {kind} files",
        repo.owner,
        repo.repo
    );

    for file in policy_files(kind) {
        let Some(url) = repo.raw_file_url(file) else { continue };
        if let Some(text) = fetch_text(request, fetcher, &url).await
            && !text.trim().is_empty()
        {
            let excerpt = safe_truncate_chars(text.trim(), MAX_EXCERPT_CHARS).to_string();
            return vec![
                Candidate::new(
                    url,
                    SourceStage::RepositoryFile,
                    options.weights.repository_file,
                    format!("repository file {file}"),
                )
                .with_excerpt(excerpt),
            ];
        }
    }

    let mut readme = None;
    for file in README_FILES {
        let Some(url) = repo.raw_file_url(file) else { continue };
        if let Some(text) = fetch_text(request, fetcher, &url).await {
            readme = Some((url, text));
            break;
        }
    }

    let mut found = Vec::new();
    if let Some((_, text)) = &readme {
        found = readme_links(text, repo, kind, options);
        if found.iter().any(|c| c.confidence() >= options.threshold) {
            return found;
        }
    }

    let security = match repo.raw_file_url("SECURITY.md") {
        Some(url) => fetch_text(request, fetcher, &url).await.map(|text| (url, text)),
        None => None,
    };
    for (url, text) in security.iter().chain(readme.iter()) {
        if let Some((heading, body)) = section_for_kind(text, kind, options.dictionary) {
            debug!(target: "policy_locator::specializer", "Section '{heading}' of {url} holds the {kind} text");
            found.push(
                Candidate::new(
                    url.clone(),
                    SourceStage::RepositoryContent,
                    options.weights.repository_content,
                    format!("section '{heading}' of {} is the document", file_name(url)),
                )
                .with_excerpt(safe_truncate_chars(&body, MAX_EXCERPT_CHARS)),
            );
            break;
        }
    }

    let mut found = dedupe_candidates(found);
    rank_candidates(&mut found);
    found
}

async fn fetch_text(request: &mut DiscoveryRequest, fetcher: &StaticFetcher, url: &Url) -> Option<String> {
    let result = request.fetch(fetcher, url).await?;
    if result.is_ok() { result.html_body } else { None }
}

fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("file")
}

/// Links in README markdown that point at the document.
fn readme_links(markdown: &str, repo: &RepoRef, kind: DocumentKind, options: &ExtractOptions<'_>) -> Vec<Candidate> {
    let scorer = LinkScorer::new(kind, options.dictionary, options.weights);

    let links = MARKDOWN_LINK
        .captures_iter(markdown)
        .chain(REFERENCE_LINK.captures_iter(markdown))
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())));

    let mut candidates: Vec<Candidate> = links
        .filter_map(|(text, href)| {
            let url = resolve_readme_href(repo, href)?;
            let signal = scorer.score(text, &url, ElementContext::Body)?;
            Some(Candidate::new(
                url,
                SourceStage::RepositoryReadme,
                signal.computed_score,
                format!("README link '{}'", collapse_whitespace(text)),
            ))
        })
        .collect();
    rank_candidates(&mut candidates);
    candidates
}

fn resolve_readme_href(repo: &RepoRef, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.starts_with('#') || href.is_empty() {
        return None;
    }
    if href.contains("://") {
        let url = Url::parse(href).ok()?;
        return matches!(url.scheme(), "http" | "https").then_some(url);
    }
    if href.contains(':') {
        // mailto:, tel: and friends
        return None;
    }
    let path = href.split('#').next().unwrap_or(href);
    repo.raw_file_url(path)
}

/// The first markdown section whose heading names `kind`, as
/// `(heading, body)`. Fenced code is never mistaken for headings.
#[must_use]
pub fn section_for_kind(markdown: &str, kind: DocumentKind, dictionary: &TermDictionary) -> Option<(String, String)> {
    let terms = dictionary.for_kind(kind);
    let mut in_fence = false;
    let mut open: Option<(usize, String)> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~") {
            in_fence = !in_fence;
        }
        let heading = (!in_fence)
            .then(|| HEADING.captures(line))
            .flatten()
            .and_then(|caps| Some((caps.get(1)?.as_str().len(), caps.get(2)?.as_str().to_string())));

        if let Some((level, title)) = heading {
            if let Some((open_level, open_title)) = &open {
                if level <= *open_level {
                    let text = body.join("\n").trim().to_string();
                    if !text.is_empty() {
                        return Some((open_title.clone(), text));
                    }
                    open = None;
                    body.clear();
                } else {
                    body.push(line);
                    continue;
                }
            }
            let (matched, _) = match_text(terms, &normalize_label(&title));
            if matched >= TextMatch::Strong {
                open = Some((level, title));
            }
            continue;
        }

        if open.is_some() {
            body.push(line);
        }
    }

    let (_, title) = open?;
    let text = body.join("\n").trim().to_string();
    (!text.is_empty()).then_some((title, text))
}
