//! Query intent recognition: what the user wants, which names they mention,
//! and which broad concepts the query touches.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    FindCode,
    Explain,
    Debug,
    Refactor,
    Architect,
}

impl IntentKind {
    /// Tie-break order: earlier wins.
    pub const ALL: [Self; 5] = [
        Self::FindCode,
        Self::Explain,
        Self::Debug,
        Self::Refactor,
        Self::Architect,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindCode => "find_code",
            Self::Explain => "explain",
            Self::Debug => "debug",
            Self::Refactor => "refactor",
            Self::Architect => "architect",
        }
    }

    fn cues(self) -> &'static [&'static str] {
        match self {
            Self::FindCode => &[
                r"\b(find|search|locate|where|show|get)\b.*\b(code|function|class|struct|impl|method)\b",
                r"\b(example|snippet|reference)\b",
                r"\b(how to|how do)\b.*\b(implement|use|call)\b",
            ],
            Self::Explain => &[
                r"\b(explain|what is|how does|describe)\b",
                r"\b(understand|clarify|meaning)\b",
                r"\b(why|how)\b.*\b(work|function|system)\b",
            ],
            Self::Debug => &[
                r"\b(error|bug|issue|fail|crash|broken)\b",
                r"\b(fix|solve|resolve|debug)\b",
                r"\b(not working|wrong|incorrect)\b",
            ],
            Self::Refactor => &[
                r"\b(refactor|improve|optimize|clean|simplify)\b",
                r"\b(better|efficient|performance)\b",
                r"\b(restructure|reorganize)\b",
            ],
            Self::Architect => &[
                r"\b(architecture|design|pattern|structure)\b",
                r"\b(system|module|component|service)\b",
                r"\b(how should|best way|approach)\b",
            ],
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLabel {
    Implementation,
    Design,
    Debugging,
    Performance,
}

impl ContextLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Implementation => "implementation",
            Self::Design => "design",
            Self::Debugging => "debugging",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for ContextLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concept tag → keywords, any of which (as a substring) tags the query.
const CONCEPTS: &[(&str, &[&str])] = &[
    ("rendering", &["render", "shader", "pipeline", "gpu", "wgpu", "draw", "vertex", "fragment"]),
    ("memory", &["memory", "alloc", "buffer", "cache", "leak", "ownership", "borrow"]),
    ("concurrency", &["thread", "async", "await", "sync", "mutex", "lock", "channel"]),
    ("ui", &["ui", "interface", "widget", "window", "event", "input", "layout"]),
    ("data", &["data", "struct", "class", "object", "array", "vector", "map"]),
    ("network", &["network", "http", "socket", "server", "client", "request"]),
    ("database", &["database", "sql", "query", "table", "index", "lance", "vector"]),
    ("ai", &["ai", "ml", "model", "embedding", "vector", "semantic", "search"]),
];

/// Checked in order; the first label with a matching keyword wins.
const CONTEXT_KEYWORDS: &[(ContextLabel, &[&str])] = &[
    (ContextLabel::Design, &["design", "architecture", "pattern"]),
    (ContextLabel::Debugging, &["error", "bug", "fix", "debug"]),
    (ContextLabel::Performance, &["performance", "optimize", "fast"]),
];

static INTENT_CUES: LazyLock<Vec<(IntentKind, Vec<Regex>)>> = LazyLock::new(|| {
    IntentKind::ALL
        .iter()
        .map(|&kind| {
            let cues = kind
                .cues()
                .iter()
                .map(|c| Regex::new(&format!("(?i){c}")).expect("intent cue regex is valid"))
                .collect();
            (kind, cues)
        })
        .collect()
});

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").expect("capitalized regex is valid"));

static CALLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-z][A-Za-z0-9_]*)\(\)").expect("call regex is valid"));

static CAMEL_CASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z][a-z0-9]*[A-Z][A-Za-z0-9_]*\b").expect("camel case regex is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub kind: IntentKind,
    /// Identifier-like tokens that probably name code entities.
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
    pub context: ContextLabel,
    /// In `[0, 1]`.
    pub specificity: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn recognize(&self, query: &str) -> QueryIntent {
        let lower = query.to_lowercase();

        let mut kind = IntentKind::FindCode;
        let mut best = 0;
        for (candidate, cues) in INTENT_CUES.iter() {
            let hits = cues.iter().filter(|re| re.is_match(&lower)).count();
            if hits > best {
                best = hits;
                kind = *candidate;
            }
        }

        let entities = entity_tokens(query);
        let concepts: Vec<String> = CONCEPTS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(tag, _)| (*tag).to_owned())
            .collect();
        let context = CONTEXT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map_or(ContextLabel::Implementation, |(label, _)| *label);

        let specificity = specificity(entities.len(), concepts.len(), query.split_whitespace().count());

        QueryIntent {
            kind,
            entities,
            concepts,
            context,
            specificity,
        }
    }
}

/// Capitalized identifiers, camelCase identifiers and `name()` calls, in
/// order of first appearance, without repeats.
fn entity_tokens(query: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = CAPITALIZED
        .find_iter(query)
        .chain(CAMEL_CASE.find_iter(query))
        .map(|m| (m.start(), m.as_str()))
        .chain(
            CALLED
                .captures_iter(query)
                .filter_map(|c| c.get(1))
                .map(|m| (m.start(), m.as_str())),
        )
        .collect();
    found.sort_by_key(|(at, _)| *at);

    let mut tokens: Vec<String> = Vec::with_capacity(found.len());
    for (_, token) in found {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_owned());
        }
    }
    tokens
}

#[allow(clippy::cast_precision_loss)]
fn specificity(entities: usize, concepts: usize, words: usize) -> f32 {
    (0.3 * entities as f32 + 0.2 * concepts as f32 + 0.05 * words as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn recognize(q: &str) -> QueryIntent {
        IntentClassifier::new().recognize(q)
    }

    #[test]
    fn find_code_with_camel_case_entity() {
        let intent = recognize("find the parseConfig function");
        assert_eq!(intent.kind, IntentKind::FindCode);
        assert!(intent.entities.contains(&"parseConfig".to_string()));
    }

    #[test]
    fn explain_cache_eviction() {
        let intent = recognize("explain how the cache eviction works");
        assert_eq!(intent.kind, IntentKind::Explain);
        assert_eq!(intent.context, ContextLabel::Implementation);
        assert!(intent.concepts.contains(&"memory".to_string()));
    }

    #[test]
    fn no_cues_defaults_to_find_code() {
        let intent = recognize("zebra quantum");
        assert_eq!(intent.kind, IntentKind::FindCode);
        assert!(intent.entities.is_empty());
        assert!(intent.concepts.is_empty());
    }

    #[test]
    fn highest_cue_count_wins() {
        // debug: "error", "fix" (2) beats explain: "why ... system" (1)
        let intent = recognize("why does the system error, fix it");
        assert_eq!(intent.kind, IntentKind::Debug);
        assert_eq!(intent.context, ContextLabel::Debugging);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        // explain: "explain" (1); refactor: "optimize" (1)
        let intent = recognize("explain and optimize");
        assert_eq!(intent.kind, IntentKind::Explain);
    }

    #[test]
    fn context_priority_design_first() {
        let intent = recognize("design bug with performance");
        assert_eq!(intent.context, ContextLabel::Design);
        let intent = recognize("make it fast");
        assert_eq!(intent.context, ContextLabel::Performance);
    }

    #[test]
    fn entity_tokens_capitalized_calls_and_dedup() {
        let intent = recognize("does SmartCache call evict() before SmartCache.put");
        assert_eq!(intent.entities, vec!["SmartCache", "evict"]);
    }

    #[test]
    fn multiple_concepts() {
        let intent = recognize("async http server");
        assert_eq!(intent.concepts, vec!["concurrency", "network"]);
    }

    #[test]
    fn specificity_formula() {
        // 1 entity, 1 concept ("cache" → memory), 3 words
        let intent = recognize("Lru cache eviction");
        let expected = 0.3 + 0.2 + 0.15;
        assert!((intent.specificity - expected).abs() < 1e-5);
        assert!((specificity(10, 10, 10) - 1.0).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn specificity_is_bounded(q in "[A-Za-z() ]{0,80}") {
            let s = recognize(&q).specificity;
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
