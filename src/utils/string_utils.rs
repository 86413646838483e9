//! Text helpers for link labels and extracted excerpts
//!
//! Link text pulled out of real pages is full of stray whitespace, icons and
//! trailing punctuation. Everything that compares text against the term
//! dictionary goes through [`normalize_label`] first.

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// Respects UTF-8 character boundaries and never panics on multi-byte input.
///
/// # Examples
/// ```
/// # use policy_locator::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("Datenschutzerklärung", 12), "Datenschutze");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, collapse whitespace, and strip leading/trailing punctuation or
/// symbols so that "  Privacy Policy » " compares equal to "privacy policy".
#[must_use]
pub fn normalize_label(s: &str) -> String {
    let collapsed = collapse_whitespace(&s.to_lowercase());
    collapsed
        .trim_matches(|c: char| !c.is_alphanumeric())
        .replace('’', "'")
}

/// Whether `term` occurs in `haystack` as a whole word.
///
/// Both sides must already be lowercase. Terms written in scripts without
/// word separators (CJK, kana) match as plain substrings.
#[must_use]
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if !term.is_ascii() && term.chars().any(is_unspaced_script) {
        return haystack.contains(term);
    }

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

fn is_unspaced_script(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF   // hiragana, katakana
        | 0x3400..=0x4DBF // CJK extension A
        | 0x4E00..=0x9FFF // CJK unified
        | 0xAC00..=0xD7AF // hangul
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_decoration() {
        assert_eq!(normalize_label("  Privacy\n   Policy » "), "privacy policy");
        assert_eq!(normalize_label("Terms & Conditions"), "terms & conditions");
    }

    #[test]
    fn terms_match_on_word_boundaries() {
        assert!(contains_term("read our terms", "terms"));
        assert!(contains_term("tos", "tos"));
        assert!(!contains_term("photos and videos", "tos"));
        assert!(contains_term("/legal/privacy-policy", "privacy-policy"));
        assert!(contains_term("隐私政策", "隐私"));
    }
}
