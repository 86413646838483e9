//! Multilingual term dictionary
//!
//! The vocabulary used to recognise legal links lives in data, not code. The
//! default set is `dictionary.json` next to this file, compiled into the
//! binary; deployments can swap in their own file through
//! [`TermDictionary::from_json_file`] or the `dictionary_path` config key.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::discovery::DocumentKind;

const DEFAULT_DICTIONARY: &str = include_str!("dictionary.json");

static EMBEDDED: Lazy<TermDictionary> = Lazy::new(|| {
    serde_json::from_str::<TermDictionary>(DEFAULT_DICTIONARY)
        .expect("embedded dictionary.json must parse")
        .normalized()
});

/// Terms for one document kind, strongest evidence first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindTerms {
    /// Phrases that, as the whole link text, identify the document outright.
    pub canonical: Vec<String>,
    /// Words that identify the document when they appear anywhere in the text.
    pub strong: Vec<String>,
    /// Related vocabulary that only hints at the document.
    pub weak: Vec<String>,
    /// Path tokens such as `privacy-policy` that identify the document in an href.
    pub path: Vec<String>,
    /// Conventional paths probed directly on the site root.
    pub probe_paths: Vec<String>,
}

/// Every piece of vocabulary the discovery pipeline matches against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDictionary {
    pub privacy: KindTerms,
    pub terms: KindTerms,
    /// Button labels that dismiss cookie/consent overlays.
    #[serde(default)]
    pub consent_buttons: Vec<String>,
    /// Labels and class fragments that identify collapsed menu toggles.
    #[serde(default)]
    pub menu_toggles: Vec<String>,
}

impl Default for TermDictionary {
    fn default() -> Self {
        EMBEDDED.clone()
    }
}

impl TermDictionary {
    /// Load a dictionary from a JSON file with the same shape as the embedded one.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dictionary: Self = serde_json::from_str(&raw)?;
        if dictionary.privacy.canonical.is_empty() && dictionary.privacy.strong.is_empty() {
            return Err(ConfigError::Invalid(
                "dictionary has no privacy terms".to_string(),
            ));
        }
        if dictionary.terms.canonical.is_empty() && dictionary.terms.strong.is_empty() {
            return Err(ConfigError::Invalid("dictionary has no terms vocabulary".to_string()));
        }
        Ok(dictionary.normalized())
    }

    #[must_use]
    pub fn for_kind(&self, kind: DocumentKind) -> &KindTerms {
        match kind {
            DocumentKind::Privacy => &self.privacy,
            DocumentKind::Terms => &self.terms,
        }
    }

    /// Lowercase every entry so matching never has to.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for terms in [&mut self.privacy, &mut self.terms] {
            for list in [
                &mut terms.canonical,
                &mut terms.strong,
                &mut terms.weak,
                &mut terms.path,
            ] {
                lowercase_all(list);
            }
        }
        lowercase_all(&mut self.consent_buttons);
        lowercase_all(&mut self.menu_toggles);
        self
    }
}

fn lowercase_all(list: &mut Vec<String>) {
    for entry in list.iter_mut() {
        *entry = entry.trim().to_lowercase();
    }
    list.retain(|entry| !entry.is_empty());
    list.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_dictionary_covers_both_kinds() {
        let dictionary = TermDictionary::default();
        assert!(
            dictionary
                .for_kind(DocumentKind::Privacy)
                .canonical
                .contains(&"privacy policy".to_string())
        );
        assert!(dictionary.for_kind(DocumentKind::Terms).strong.contains(&"tos".to_string()));
        assert!(dictionary.for_kind(DocumentKind::Privacy).strong.contains(&"datenschutz".to_string()));
        assert!(!dictionary.consent_buttons.is_empty());
    }
}
