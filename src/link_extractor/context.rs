//! Element context and visibility classification
//!
//! Both questions are answered by walking an anchor's ancestors: which page
//! region it sits in (footer, nav, header, body) and whether any ancestor
//! hides it from a reader who has not clicked anything yet.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use once_cell::sync::Lazy;

static TOGGLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[aria-expanded="false"][aria-controls]"#).expect("valid toggle selector")
});

/// Class tokens (or token prefixes) that mark a region hidden until toggled.
const HIDDEN_CLASS_TOKENS: &[&str] = &[
    "hidden",
    "d-none",
    "is-hidden",
    "collapse",
    "collapsed",
    "modal",
    "dropdown-menu",
    "dropdown-content",
    "submenu",
    "offcanvas",
    "drawer",
    "popover",
    "flyout",
];

/// Page region an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementContext {
    Footer,
    Nav,
    Header,
    Body,
}

impl ElementContext {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Footer => "footer",
            Self::Nav => "nav",
            Self::Header => "header",
            Self::Body => "body",
        }
    }
}

/// Classify the region of `element`. Footer wins over nav, nav over header,
/// since footers routinely wrap their link lists in `<nav>`.
#[must_use]
pub fn element_context(element: &ElementRef<'_>) -> ElementContext {
    let mut in_nav = false;
    let mut in_header = false;

    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        let value = ancestor.value();
        let name = value.name();
        let role = value.attr("role").unwrap_or_default();
        let markers = marker_text(&ancestor);

        if name == "footer" || role == "contentinfo" || markers.contains("footer") {
            return ElementContext::Footer;
        }
        if name == "nav"
            || role == "navigation"
            || markers.split(' ').any(|token| token_starts_with_part(token, "nav"))
        {
            in_nav = true;
        }
        if name == "header" || role == "banner" || markers.contains("header") {
            in_header = true;
        }
    }

    if in_nav {
        ElementContext::Nav
    } else if in_header {
        ElementContext::Header
    } else {
        ElementContext::Body
    }
}

/// Lowercased id and class list of an element, space separated.
fn marker_text(element: &ElementRef<'_>) -> String {
    let value = element.value();
    let mut markers = value.id().unwrap_or_default().to_ascii_lowercase();
    for class in value.classes() {
        markers.push(' ');
        markers.push_str(&class.to_ascii_lowercase());
    }
    markers
}

/// `nav` matches `nav`, `navbar`, `main-nav`, `site_navigation` but not `unavailable`.
fn token_starts_with_part(token: &str, prefix: &str) -> bool {
    token
        .split(['-', '_'])
        .any(|part| part.starts_with(prefix))
}

/// Ids of elements that a collapsed toggle (`aria-expanded="false"`) controls.
#[derive(Debug, Default)]
pub struct HiddenRegions {
    controlled_ids: HashSet<String>,
}

impl HiddenRegions {
    #[must_use]
    pub fn collect(document: &Html) -> Self {
        let controlled_ids = document
            .select(&TOGGLE_SELECTOR)
            .filter_map(|toggle| toggle.value().attr("aria-controls"))
            .flat_map(|ids| ids.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .collect();
        Self { controlled_ids }
    }

    /// Whether `element` or any ancestor is hidden from an unclicked page.
    #[must_use]
    pub fn hides(&self, element: &ElementRef<'_>) -> bool {
        let mut previous_name: Option<&str> = None;
        for node in std::iter::once(*element).chain(element.ancestors().filter_map(ElementRef::wrap)) {
            let value = node.value();
            let name = value.name();

            if name == "template" {
                return true;
            }
            // Content of a closed <details> is hidden, its <summary> is not.
            if name == "details" && value.attr("open").is_none() && previous_name != Some("summary") {
                return true;
            }
            if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
                return true;
            }
            if let Some(style) = value.attr("style") {
                let style: String = style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                if style.contains("display:none") || style.contains("visibility:hidden") {
                    return true;
                }
            }
            if value
                .id()
                .is_some_and(|id| self.controlled_ids.contains(id))
            {
                return true;
            }
            if value.classes().any(|class| {
                let class = class.to_ascii_lowercase();
                HIDDEN_CLASS_TOKENS.iter().any(|token| class == *token)
                    || class.contains("modal")
                    || class.starts_with("dropdown-")
            }) {
                return true;
            }
            previous_name = Some(name);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_anchor(document: &Html) -> ElementRef<'_> {
        let selector = Selector::parse("a").unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn footer_beats_nested_nav() {
        let html = Html::parse_document(
            r#"<footer><nav><ul><li><a href="/privacy">Privacy</a></li></ul></nav></footer>"#,
        );
        assert_eq!(element_context(&first_anchor(&html)), ElementContext::Footer);
    }

    #[test]
    fn class_markers_classify_regions() {
        let html = Html::parse_document(
            r#"<div class="site-footer__links"><a href="/terms">Terms</a></div>"#,
        );
        assert_eq!(element_context(&first_anchor(&html)), ElementContext::Footer);

        let html = Html::parse_document(r#"<div class="main-navbar"><a href="/terms">Terms</a></div>"#);
        assert_eq!(element_context(&first_anchor(&html)), ElementContext::Nav);

        let html = Html::parse_document(r#"<div class="unavailable"><a href="/terms">Terms</a></div>"#);
        assert_eq!(element_context(&first_anchor(&html)), ElementContext::Body);
    }

    #[test]
    fn collapsed_regions_are_hidden() {
        let html = Html::parse_document(
            r#"<button aria-expanded="false" aria-controls="legal-menu">Legal</button>
               <ul id="legal-menu"><li><a href="/privacy">Privacy</a></li></ul>"#,
        );
        let regions = HiddenRegions::collect(&html);
        assert!(regions.hides(&first_anchor(&html)));

        let html = Html::parse_document(r#"<div class="dropdown-menu"><a href="/privacy">Privacy</a></div>"#);
        assert!(HiddenRegions::collect(&html).hides(&first_anchor(&html)));

        let html = Html::parse_document(r#"<p><a href="/privacy">Privacy</a></p>"#);
        assert!(!HiddenRegions::collect(&html).hides(&first_anchor(&html)));
    }
}
