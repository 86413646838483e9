//! Lexical scoring of a single link against the term dictionary

use url::Url;

use super::context::ElementContext;
use crate::config::{KindTerms, ScoringWeights, TermDictionary};
use crate::discovery::DocumentKind;
use crate::utils::{contains_term, normalize_label};

/// How strongly the link text matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextMatch {
    None,
    Weak,
    Strong,
    /// A canonical phrase inside longer text, e.g. "Read our Privacy Policy".
    CanonicalWithin,
    /// The whole text is a canonical phrase.
    Exact,
}

/// Evidence gathered for one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSignal {
    pub matched_term: String,
    pub element_context: ElementContext,
    pub link_text: String,
    pub href: Url,
    pub text_match: TextMatch,
    pub href_match: bool,
    /// Set by the related-link heuristic.
    pub beside_counterpart: bool,
    pub computed_score: f64,
}

impl ExtractionSignal {
    /// Short human-readable reason, used as the candidate's rationale.
    #[must_use]
    pub fn describe(&self) -> String {
        let how = match self.text_match {
            TextMatch::Exact => "text is the canonical phrase",
            TextMatch::CanonicalWithin => "text contains the canonical phrase",
            TextMatch::Strong => "text contains",
            TextMatch::Weak => "text hints at",
            TextMatch::None => "href path contains",
        };
        let mut description = format!(
            "{} link '{}': {how} '{}'",
            self.element_context.as_str(),
            self.link_text,
            self.matched_term
        );
        if self.beside_counterpart {
            description.push_str(", listed beside a matching counterpart link");
        }
        description
    }
}

/// Scores links for one document kind.
#[derive(Debug, Clone, Copy)]
pub struct LinkScorer<'a> {
    kind: DocumentKind,
    target: &'a KindTerms,
    counterpart: &'a KindTerms,
    weights: &'a ScoringWeights,
}

impl<'a> LinkScorer<'a> {
    #[must_use]
    pub fn new(kind: DocumentKind, dictionary: &'a TermDictionary, weights: &'a ScoringWeights) -> Self {
        Self {
            kind,
            target: dictionary.for_kind(kind),
            counterpart: dictionary.for_kind(kind.counterpart()),
            weights,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Score an anchor. `None` means no evidence, or evidence that the link
    /// is the other kind of document.
    #[must_use]
    pub fn score(&self, link_text: &str, href: &Url, context: ElementContext) -> Option<ExtractionSignal> {
        let text = normalize_label(link_text);
        let path = decoded_path(href);

        let (text_match, text_term) = match_text(self.target, &text);
        let href_term = match_path(self.target, &path);

        if self.looks_like_counterpart(&text, &path, text_match, href_term.is_some()) {
            return None;
        }

        let text_score = match text_match {
            TextMatch::Exact => self.weights.exact_text,
            TextMatch::CanonicalWithin => (self.weights.exact_text + self.weights.strong_text) / 2.0,
            TextMatch::Strong => self.weights.strong_text,
            TextMatch::Weak => self.weights.weak_text,
            TextMatch::None => 0.0,
        };
        let href_score = if href_term.is_some() { self.weights.href_path } else { 0.0 };

        let mut score = text_score.max(href_score);
        if score <= 0.0 {
            return None;
        }
        if text_score > 0.0 && href_score > 0.0 {
            score += self.weights.text_href_agreement;
        }
        score *= self.context_multiplier(context);

        let matched_term = text_term.or(href_term).unwrap_or_default();
        Some(ExtractionSignal {
            matched_term,
            element_context: context,
            link_text: crate::utils::collapse_whitespace(link_text),
            href: href.clone(),
            text_match,
            href_match: href_score > 0.0,
            beside_counterpart: false,
            computed_score: score.min(1.0),
        })
    }

    /// Whether the text alone says anything about this kind (used by the
    /// related-link heuristic and the repository README scan).
    #[must_use]
    pub fn has_any_evidence(&self, link_text: &str, href: &Url) -> bool {
        let text = normalize_label(link_text);
        match_text(self.target, &text).0 != TextMatch::None
            || match_path(self.target, &decoded_path(href)).is_some()
    }

    #[must_use]
    pub fn context_multiplier(&self, context: ElementContext) -> f64 {
        match context {
            ElementContext::Footer => self.weights.footer_boost,
            ElementContext::Nav => self.weights.nav_boost,
            ElementContext::Header => self.weights.header_boost,
            ElementContext::Body => 1.0,
        }
    }

    /// A link labelled as the other document, with nothing of ours but a
    /// weak hint, belongs to the other kind.
    fn looks_like_counterpart(&self, text: &str, path: &str, ours: TextMatch, our_href: bool) -> bool {
        let (theirs, _) = match_text(self.counterpart, text);
        let their_href = match_path(self.counterpart, path).is_some();

        if theirs >= TextMatch::CanonicalWithin && ours < TextMatch::Strong {
            return true;
        }
        their_href && !our_href && ours <= TextMatch::Weak && theirs >= TextMatch::Strong
    }
}

/// Best text match of `text` (already normalized) against `terms`.
#[must_use]
pub fn match_text(terms: &KindTerms, text: &str) -> (TextMatch, Option<String>) {
    if text.is_empty() {
        return (TextMatch::None, None);
    }
    if let Some(phrase) = terms.canonical.iter().find(|phrase| phrase.as_str() == text) {
        return (TextMatch::Exact, Some(phrase.clone()));
    }
    if let Some(phrase) = terms.canonical.iter().find(|phrase| contains_term(text, phrase)) {
        return (TextMatch::CanonicalWithin, Some(phrase.clone()));
    }
    if let Some(term) = terms.strong.iter().find(|term| contains_term(text, term)) {
        return (TextMatch::Strong, Some(term.clone()));
    }
    if let Some(term) = terms.weak.iter().find(|term| contains_term(text, term)) {
        return (TextMatch::Weak, Some(term.clone()));
    }
    (TextMatch::None, None)
}

/// Path token of `terms` found in the (lowercased, decoded) path, if any.
#[must_use]
pub fn match_path(terms: &KindTerms, path: &str) -> Option<String> {
    if path.len() <= 1 {
        return None;
    }
    terms
        .path
        .iter()
        .find(|token| contains_term(path, token))
        .cloned()
}

/// Lowercased, percent-decoded path plus query, so `/datenschutzerkl%C3%A4rung`
/// and `/legal?doc=privacy` both carry their words.
#[must_use]
pub fn decoded_path(url: &Url) -> String {
    let raw = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(raw)
        .to_lowercase()
}
