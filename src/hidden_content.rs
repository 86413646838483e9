//! Hidden-content analysis
//!
//! Finds policy links a reader would only see after interacting with the
//! page, without running any JavaScript:
//!
//! - anchors inside collapsed menus, modals, `hidden`/`aria-hidden` subtrees
//!   and `<template>` elements;
//! - non-anchor elements that navigate via `data-href`-style attributes or
//!   inline `onclick` handlers;
//! - markup inside `<noscript>`;
//! - URLs embedded in inline scripts, including JSON blobs such as
//!   `__NEXT_DATA__` where the key itself often names the document.
//!
//! Results are purely additive to [`crate::link_extractor`]'s candidates.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::discovery::{Candidate, DocumentKind, SourceStage, dedupe_candidates, rank_candidates};
use crate::link_extractor::scoring::{decoded_path, match_path};
use crate::link_extractor::{
    AnchorInfo, ExtractOptions, HiddenRegions, Visibility, anchor_text, element_context,
    extract_from_document, related, score_anchors,
};
use crate::utils::{collapse_whitespace, domains_related, resolve_href};

static NAVIGATING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-href], [data-url], [data-link], [onclick]")
        .expect("valid navigating-element selector")
});
static NOSCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("noscript").expect("valid noscript selector"));
static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("valid script selector"));
static FRAGMENT_ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid body selector"));

static ONCLICK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:location(?:\.href)?\s*=|location\.assign\(|window\.open\()\s*['"]([^'"]+)['"]"#)
        .expect("valid onclick regex")
});

/// `key: "url"` or `key = "url"` assignments inside script text.
static KEYED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?([A-Za-z_$][\w$-]{0,60})["']?\s*[:=]\s*["']((?:https?:)?//[^"'\s<>]{3,300}|/[^"'\s<>]{1,200})["']"#)
        .expect("valid keyed url regex")
});

/// Any quoted absolute URL or root-relative path.
static QUOTED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']((?:https?:)?//[^"'\s<>]{3,300}|/[A-Za-z0-9][^"'\s<>]{0,200})["']"#)
        .expect("valid quoted url regex")
});

const SPA_MARKERS: &[&str] = &[
    "id=\"__next\"",
    "id=\"root\"",
    "__next_data__",
    "data-reactroot",
    "window.__nuxt__",
    "ng-app",
    "id=\"app\"",
    "data-server-rendered",
];

/// Scan a static page for hidden or script-embedded policy links.
#[must_use]
pub fn scan(html: &str, base_url: &Url, kind: DocumentKind, options: &ExtractOptions<'_>) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let mut candidates = extract_from_document(
        &document,
        base_url,
        kind,
        options,
        Visibility::Hidden,
        SourceStage::HiddenContent,
    );
    candidates.extend(scan_navigating_elements(&document, base_url, kind, options));
    candidates.extend(scan_noscript(&document, base_url, kind, options));
    candidates.extend(scan_scripts(&document, base_url, kind, options));

    let mut candidates = dedupe_candidates(candidates);
    rank_candidates(&mut candidates);
    debug!(
        target: "policy_locator::hidden",
        "{} hidden {kind} candidates on {base_url}",
        candidates.len()
    );
    candidates
}

/// Buttons and divs that navigate through attributes or `onclick`.
fn scan_navigating_elements(
    document: &Html,
    base_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
) -> Vec<Candidate> {
    let anchors: Vec<AnchorInfo> = document
        .select(&NAVIGATING_SELECTOR)
        .filter(|element| element.value().name() != "a")
        .filter_map(|element| {
            let value = element.value();
            let target = value
                .attr("data-href")
                .or_else(|| value.attr("data-url"))
                .or_else(|| value.attr("data-link"))
                .map(str::to_string)
                .or_else(|| {
                    value
                        .attr("onclick")
                        .and_then(|js| ONCLICK_TARGET.captures(js))
                        .map(|caps| caps[1].to_string())
                })?;
            let url = resolve_href(base_url, &target)?;
            Some(AnchorInfo {
                node: element.id(),
                url,
                text: anchor_text(&element),
                context: element_context(&element),
                container: related::container_of(&element),
            })
        })
        .collect();

    score_anchors(
        &anchors,
        base_url,
        kind,
        options,
        SourceStage::HiddenContent,
        Visibility::Hidden,
    )
}

/// `<noscript>` bodies arrive as raw text when parsed with scripting on;
/// re-parse them as fragments to reach their anchors.
fn scan_noscript(
    document: &Html,
    base_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for noscript in document.select(&NOSCRIPT_SELECTOR) {
        let inner = noscript.inner_html();
        if !inner.contains("<a") {
            continue;
        }
        let fragment = Html::parse_fragment(&decode_basic_entities(&inner));
        let regions = HiddenRegions::default();
        let anchors: Vec<AnchorInfo> = fragment
            .select(&FRAGMENT_ANCHOR_SELECTOR)
            .filter(|anchor| !regions.hides(anchor))
            .filter_map(|anchor| crate::link_extractor::anchor_info(&anchor, base_url))
            .collect();
        candidates.extend(score_anchors(
            &anchors,
            base_url,
            kind,
            options,
            SourceStage::HiddenContent,
            Visibility::Hidden,
        ));
    }
    candidates
}

fn decode_basic_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// URLs inside inline `<script>` blocks.
fn scan_scripts(
    document: &Html,
    base_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
) -> Vec<Candidate> {
    let key_words = key_words(kind, options);
    let mut found: Vec<ScriptHit> = Vec::new();

    for script in document.select(&SCRIPT_SELECTOR) {
        if script.value().attr("src").is_some() {
            continue;
        }
        let body: String = script.text().collect();
        if body.trim().is_empty() {
            continue;
        }

        let script_type = script.value().attr("type").unwrap_or_default().to_ascii_lowercase();
        let is_json = script_type.contains("json") || script.value().id() == Some("__NEXT_DATA__");

        if is_json && let Ok(value) = serde_json::from_str::<Value>(&body) {
            walk_json(&value, None, &mut found);
            continue;
        }

        for caps in KEYED_URL.captures_iter(&body) {
            found.push(ScriptHit {
                key: Some(caps[1].to_string()),
                raw_url: caps[2].to_string(),
            });
        }
        for caps in QUOTED_URL.captures_iter(&body) {
            found.push(ScriptHit {
                key: None,
                raw_url: caps[1].to_string(),
            });
        }
    }

    let target = options.dictionary.for_kind(kind);
    let site_host = base_url.host_str().unwrap_or_default();

    let candidates: Vec<Candidate> = found
        .into_iter()
        .filter_map(|hit| {
            let url = resolve_href(base_url, &hit.raw_url)?;
            let path = decoded_path(&url);
            let path_term = match_path(target, &path);
            let key_match = hit.key.as_deref().filter(|key| {
                let lower = key.to_ascii_lowercase();
                key_words.iter().any(|word| lower.contains(word.as_str()))
            });

            if path_term.is_none() && key_match.is_none() {
                return None;
            }

            let mut score = options.weights.script_url;
            if key_match.is_some() {
                score += options.weights.json_key_bonus;
            }
            if !options.allow_off_site && !domains_related(site_host, url.host_str().unwrap_or_default()) {
                if options.same_origin_only {
                    return None;
                }
                score *= options.weights.external_penalty;
            }

            let rationale = match (&key_match, &path_term) {
                (Some(key), _) => format!("script value under key '{key}'"),
                (None, Some(term)) => format!("script string with path term '{term}'"),
                (None, None) => "script string".to_string(),
            };
            Some(Candidate::new(url, SourceStage::HiddenContent, score, rationale))
        })
        .collect();

    candidates
}

#[derive(Debug)]
struct ScriptHit {
    key: Option<String>,
    raw_url: String,
}

fn walk_json(value: &Value, key: Option<&str>, out: &mut Vec<ScriptHit>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("http://") || s.starts_with("https://") || (s.starts_with('/') && !s.starts_with("//") && s.len() > 1) {
                out.push(ScriptHit {
                    key: key.map(str::to_string),
                    raw_url: s.to_string(),
                });
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json(item, key, out);
            }
        }
        Value::Object(map) => {
            // Link objects often look like {"label": "Privacy Policy", "href": "/p"}:
            // let the label stand in as the key for its sibling URL.
            let label = ["label", "title", "text", "name"]
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str));
            for (child_key, child) in map {
                let effective = match (child_key.as_str(), label) {
                    ("href" | "url" | "link" | "path", Some(label)) => label,
                    _ => child_key.as_str(),
                };
                walk_json(child, Some(effective), out);
            }
        }
        _ => {}
    }
}

/// Words that mark a script key as naming the document kind.
fn key_words(kind: DocumentKind, options: &ExtractOptions<'_>) -> Vec<String> {
    let terms = options.dictionary.for_kind(kind);
    terms
        .path
        .iter()
        .chain(terms.strong.iter())
        .chain(terms.canonical.iter())
        .map(|word| word.replace(['-', '_', ' '], ""))
        .filter(|word| word.is_ascii() && word.len() >= 3)
        .collect()
}

/// Whether the page looks like a client-rendered shell whose links only
/// appear after JavaScript runs.
#[must_use]
pub fn is_likely_spa(html: &str) -> bool {
    if html.is_empty() {
        return false;
    }
    let lower = html.to_lowercase();
    if let Some(marker) = SPA_MARKERS.iter().find(|marker| lower.contains(*marker)) {
        debug!(target: "policy_locator::hidden", "SPA detected: framework marker '{marker}'");
        return true;
    }

    let document = Html::parse_document(html);
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return false;
    };
    let visible_text: String = visible_text(&body);
    let ratio = visible_text.len() as f64 / html.len() as f64;
    if ratio < 0.05 && html.len() > 1000 {
        debug!(target: "policy_locator::hidden", "SPA detected: text/HTML ratio {ratio:.3}");
        return true;
    }

    let only_scripts = body
        .children()
        .filter_map(ElementRef::wrap)
        .all(|child| matches!(child.value().name(), "script" | "noscript" | "style" | "link" | "div") && collapse_whitespace(&self::visible_text(&child)).is_empty());
    only_scripts && visible_text.trim().is_empty()
}

fn visible_text(element: &ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let parent_is_script = node
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"));
            if parent_is_script {
                return None;
            }
            node.value().as_text().map(|text| text.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn run(html: &str, kind: DocumentKind) -> Vec<Candidate> {
        let config = DiscoveryConfig::default();
        let options = ExtractOptions::from_config(&config);
        scan(html, &base(), kind, &options)
    }

    #[test]
    fn collapsed_menu_links_are_found() {
        let html = r#"
            <button aria-expanded="false" aria-controls="legal">Legal</button>
            <ul id="legal"><li><a href="/privacy">Privacy Policy</a></li></ul>"#;
        let candidates = run(html, DocumentKind::Privacy);
        assert_eq!(candidates[0].url().path(), "/privacy");
        assert_eq!(candidates[0].source_stage(), SourceStage::HiddenContent);
        assert!(candidates[0].confidence() >= 0.6);
    }

    #[test]
    fn next_data_json_key_names_the_document() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"footer":{"privacyPolicyUrl":"/legal/pp","blog":"/blog"}}}
        </script>"#;
        let candidates = run(html, DocumentKind::Privacy);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url().path(), "/legal/pp");
        assert!(candidates[0].rationale().contains("privacyPolicyUrl"));
    }

    #[test]
    fn inline_script_paths_are_extracted() {
        let html = r#"<script>window.__links = ["/about", "/terms-of-service"];</script>"#;
        let candidates = run(html, DocumentKind::Terms);
        assert_eq!(candidates[0].url().path(), "/terms-of-service");
        assert!(run(html, DocumentKind::Privacy).is_empty());
    }

    #[test]
    fn onclick_navigation_is_followed() {
        let html = r#"<footer><span onclick="window.location.href='/privacy-notice'">Privacy</span></footer>"#;
        let candidates = run(html, DocumentKind::Privacy);
        assert_eq!(candidates[0].url().path(), "/privacy-notice");
    }

    #[test]
    fn spa_shells_are_detected() {
        assert!(is_likely_spa(r#"<html><body><div id="__next"></div><script src="/app.js"></script></body></html>"#));
        assert!(!is_likely_spa("<html><body><main><h1>Welcome</h1><p>Plenty of server-rendered text here.</p></main></body></html>"));
    }
}
