//! Related-link heuristic
//!
//! Legal links travel in packs: a footer list holding "Terms of Service"
//! almost always holds the privacy link too, even when the latter is labelled
//! vaguely ("Your data", "Cookies & privacy"). A confident counterpart link
//! therefore lends a small boost to target-kind links sharing its container.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::ElementRef;

use super::scoring::{ExtractionSignal, LinkScorer};
use super::{AnchorInfo, ExtractOptions};
use crate::discovery::DocumentKind;

/// Containers that group sibling links.
const CONTAINER_TAGS: &[&str] = &[
    "ul", "ol", "menu", "nav", "footer", "section", "div", "p", "td", "dl",
];

/// How far up from an anchor to look for its container.
const MAX_CONTAINER_HOPS: usize = 3;

/// Nearest list-like ancestor of an anchor, skipping `li`/`span` wrappers.
#[must_use]
pub fn container_of(anchor: &ElementRef<'_>) -> Option<NodeId> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_CONTAINER_HOPS)
        .find(|ancestor| CONTAINER_TAGS.contains(&ancestor.value().name()))
        .map(|ancestor| ancestor.id())
}

/// Boost target-kind signals whose anchor shares a container with a
/// counterpart-kind link scoring at or above the threshold.
pub(crate) fn apply_related_boost(
    anchors: &[AnchorInfo],
    signals: &mut [(&AnchorInfo, ExtractionSignal)],
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
) {
    let counterpart = LinkScorer::new(kind.counterpart(), options.dictionary, options.weights);

    let anchored_containers: HashSet<NodeId> = anchors
        .iter()
        .filter(|anchor| {
            counterpart
                .score(&anchor.text, &anchor.url, anchor.context)
                .is_some_and(|signal| signal.computed_score >= options.threshold)
        })
        .filter_map(|anchor| anchor.container)
        .collect();

    if anchored_containers.is_empty() {
        return;
    }

    for (anchor, signal) in signals.iter_mut() {
        let shares_container = anchor
            .container
            .is_some_and(|container| anchored_containers.contains(&container));
        if shares_container {
            signal.computed_score = (signal.computed_score + options.weights.related_link_boost).min(1.0);
            signal.beside_counterpart = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::Html;
    use url::Url;

    use super::super::{Visibility, extract_from_document};
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::discovery::SourceStage;

    #[test]
    fn vague_sibling_of_terms_link_is_boosted() {
        let html = Html::parse_document(
            r#"<div class="links"><ul>
                 <li><a href="/terms-of-service">Terms of Service</a></li>
                 <li><a href="/your-data">Cookies &amp; data</a></li>
               </ul></div>
               <div class="content"><p><a href="/blog/cookies">cookies</a></p></div>"#,
        );
        let config = DiscoveryConfig::default();
        let options = ExtractOptions::from_config(&config);
        let base = Url::parse("https://example.com/").unwrap();
        let candidates = extract_from_document(
            &html,
            &base,
            DocumentKind::Privacy,
            &options,
            Visibility::Visible,
            SourceStage::StaticLink,
        );

        let sibling = candidates.iter().find(|c| c.url().path() == "/your-data").unwrap();
        let stray = candidates.iter().find(|c| c.url().path() == "/blog/cookies").unwrap();
        assert!(sibling.confidence() > stray.confidence());
        assert!(sibling.rationale().contains("counterpart"));
    }
}
