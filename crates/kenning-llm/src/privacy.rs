//! Reversible masking of project-specific names before prompts leave the host.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bENTITY_[0-9a-f]{8}_\d+\b").expect("placeholder regex is valid")
});

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid")
});

/// Terms shorter than this are left alone; masking `id` or `x` would shred prose.
const MIN_TERM_LEN: usize = 3;

pub trait PrivacySanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
    fn desanitize(&self, text: &str) -> String;
}

/// Replaces every whole-word occurrence of a sensitive term with
/// `ENTITY_<tag>_<n>`.
///
/// `tag` is derived from the term set. Placeholder-shaped text that this
/// masker did not produce passes through `desanitize` unchanged.
#[derive(Debug)]
pub struct TermMasker {
    matcher: Option<Regex>,
    by_term: HashMap<String, String>,
    by_placeholder: HashMap<String, String>,
}

impl TermMasker {
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = terms
            .into_iter()
            .map(Into::into)
            .filter(|t| t.len() >= MIN_TERM_LEN && IDENTIFIER_REGEX.is_match(t))
            .collect();

        let mut hasher = blake3::Hasher::new();
        for term in &unique {
            hasher.update(term.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize().to_hex();
        let tag = &digest.as_str()[..8];

        let mut by_term = HashMap::with_capacity(unique.len());
        let mut by_placeholder = HashMap::with_capacity(unique.len());
        for (i, term) in unique.iter().enumerate() {
            let placeholder = format!("ENTITY_{tag}_{i}");
            by_term.insert(term.clone(), placeholder.clone());
            by_placeholder.insert(placeholder, term.clone());
        }

        // Longest first so `CacheEntry` wins over `Cache` in the alternation.
        let mut ordered: Vec<&String> = unique.iter().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let matcher = if ordered.is_empty() {
            None
        } else {
            let alternation = ordered
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"\b(?:{alternation})\b")) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("privacy matcher build failed, prompts pass through: {e}");
                    None
                }
            }
        };

        Self {
            matcher,
            by_term,
            by_placeholder,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_term.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_term.is_empty()
    }
}

impl PrivacySanitizer for TermMasker {
    fn sanitize(&self, text: &str) -> String {
        let Some(matcher) = &self.matcher else {
            return text.to_owned();
        };
        matcher
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.by_term
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }

    fn desanitize(&self, text: &str) -> String {
        if self.by_placeholder.is_empty() {
            return text.to_owned();
        }
        PLACEHOLDER_REGEX
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.by_placeholder
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_whole_words_only() {
        let masker = TermMasker::new(["parseConfig", "Cache"]);
        let out = masker.sanitize("parseConfig reads Cache but not CacheEntry");
        assert!(!out.contains("parseConfig"));
        assert!(out.contains("CacheEntry"));
        assert!(!out.contains(" Cache "));
    }

    #[test]
    fn round_trip_restores_terms() {
        let masker = TermMasker::new(["SmartCache", "query_history"]);
        let text = "SmartCache feeds query_history.";
        let masked = masker.sanitize(text);
        assert_ne!(masked, text);
        assert_eq!(masker.desanitize(&masked), text);
    }

    #[test]
    fn longer_term_wins() {
        let masker = TermMasker::new(["Cache", "CacheEntry"]);
        let masked = masker.sanitize("CacheEntry");
        assert_eq!(masker.desanitize(&masked), "CacheEntry");
        assert!(PLACEHOLDER_REGEX.is_match(&masked));
    }

    #[test]
    fn short_and_non_identifier_terms_ignored() {
        let masker = TermMasker::new(["id", "lib.rs", "ok"]);
        assert!(masker.is_empty());
        assert_eq!(masker.sanitize("id lib.rs ok"), "id lib.rs ok");
    }

    #[test]
    fn unknown_placeholders_survive_desanitize() {
        let masker = TermMasker::new(["Graph"]);
        let foreign = TermMasker::new(["Index"]).sanitize("Index");
        let text = format!("ENTITY_99 and {foreign} stay");
        assert_eq!(masker.desanitize(&text), text);
    }

    #[test]
    fn literal_placeholder_text_is_not_restored() {
        let masker = TermMasker::new(["Graph"]);
        let prompt = "rename ENTITY_0 to Graph";
        let masked = masker.sanitize(prompt);
        assert!(masked.starts_with("rename ENTITY_0 to ENTITY_"));
        // the reply echoes both the pre-existing text and the real placeholder
        assert_eq!(masker.desanitize(&masked), prompt);
        assert_eq!(masker.desanitize("ENTITY_0"), "ENTITY_0");
    }

    #[test]
    fn placeholders_are_stable_for_the_same_terms() {
        let a = TermMasker::new(["Graph", "Index"]);
        let b = TermMasker::new(["Index", "Graph"]);
        assert_eq!(a.sanitize("Graph Index"), b.sanitize("Graph Index"));
    }

    #[test]
    fn duplicate_terms_collapse() {
        let masker = TermMasker::new(["Graph", "Graph", "Index"]);
        assert_eq!(masker.len(), 2);
    }
}
