//! Source → [`CodeEntity`] extraction, dispatched by file extension.
//!
//! Each language registers a [`LanguageStrategy`]. Extensions with no strategy,
//! and files a strategy fails on, are cut into fixed-size line chunks instead.

mod chunk;
mod python;
mod rust;
mod script;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::entity::CodeEntity;
use crate::error::Result;

pub use chunk::chunk_by_lines;
pub use python::PythonStrategy;
pub use rust::RustStrategy;
pub use script::ScriptStrategy;

pub const DEFAULT_CHUNK_LINES: usize = 50;

/// Per-language declaration finder.
///
/// Implementations fill in kind, name, content, doc, signature, line range,
/// exports and metadata. Imports and complexity are filled in by the
/// [`EntityExtractor`] for every strategy alike.
pub trait LanguageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns an error when the source cannot be understood; the caller
    /// falls back to line chunking.
    fn extract(&self, file_path: &str, content: &str) -> Result<Vec<CodeEntity>>;
}

#[derive(Clone)]
pub struct EntityExtractor {
    strategies: HashMap<String, Arc<dyn LanguageStrategy>>,
    chunk_lines: usize,
}

impl std::fmt::Debug for EntityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut exts: Vec<_> = self.strategies.keys().collect();
        exts.sort();
        f.debug_struct("EntityExtractor")
            .field("extensions", &exts)
            .field("chunk_lines", &self.chunk_lines)
            .finish()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LINES)
    }
}

impl EntityExtractor {
    /// Extractor with the built-in Python, Rust and TypeScript/JavaScript strategies.
    #[must_use]
    pub fn new(chunk_lines: usize) -> Self {
        let mut extractor = Self::bare(chunk_lines);
        extractor.register("py", Arc::new(PythonStrategy));
        extractor.register("rs", Arc::new(RustStrategy));
        let script: Arc<dyn LanguageStrategy> = Arc::new(ScriptStrategy);
        for ext in ["ts", "tsx", "js"] {
            extractor.register(ext, Arc::clone(&script));
        }
        extractor
    }

    /// Extractor with no strategies: everything is line-chunked.
    #[must_use]
    pub fn bare(chunk_lines: usize) -> Self {
        Self {
            strategies: HashMap::new(),
            chunk_lines: chunk_lines.max(1),
        }
    }

    pub fn register(&mut self, extension: &str, strategy: Arc<dyn LanguageStrategy>) {
        self.strategies
            .insert(extension.trim_start_matches('.').to_owned(), strategy);
    }

    #[must_use]
    pub fn chunk_lines(&self) -> usize {
        self.chunk_lines
    }

    /// Extract entities from `content`. Never fails.
    #[must_use]
    pub fn extract(&self, file_path: &str, content: &str) -> Vec<CodeEntity> {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let mut entities = match self.strategies.get(ext) {
            Some(strategy) => match strategy.extract(file_path, content) {
                Ok(found) if found.is_empty() && !content.trim().is_empty() => {
                    // Nothing recognisable (constants only, say): still index the text.
                    chunk_by_lines(file_path, content, self.chunk_lines)
                }
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(
                        file = %file_path,
                        strategy = strategy.name(),
                        "extraction failed, falling back to line chunks: {e}"
                    );
                    chunk_by_lines(file_path, content, self.chunk_lines)
                }
            },
            None => chunk_by_lines(file_path, content, self.chunk_lines),
        };

        let imports = extract_imports(content, ext);
        let mut seen = HashSet::with_capacity(entities.len());
        entities.retain(|e| seen.insert(e.id.clone()));
        for entity in &mut entities {
            entity.imports.clone_from(&imports);
            entity.complexity = complexity(&entity.content);
        }
        entities
    }
}

static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^from\s+(\S+)\s+import|^import\s+(\S+)").expect("python import regex is valid")
});

static RS_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^use\s+([^;]+);").expect("rust use regex is valid"));

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^import\s+.*from\s+['"]([^'"]+)['"]|^import\s+['"]([^'"]+)['"]"#)
        .expect("script import regex is valid")
});

/// Imported module names, one per matching line, in source order.
#[must_use]
pub fn extract_imports(content: &str, extension: &str) -> Vec<String> {
    let pattern: &Regex = match extension {
        "py" => &PY_IMPORT,
        "rs" => &RS_USE,
        "ts" | "tsx" | "js" => &JS_IMPORT,
        _ => return Vec::new(),
    };

    content
        .lines()
        .filter_map(|line| {
            let caps = pattern.captures(line.trim())?;
            caps.iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().trim().to_owned())
        })
        .collect()
}

/// Whether `import` refers to `name`: the whole import text, or any
/// identifier segment of it (`crate::cache::Lru` refers to `cache` and `Lru`).
#[must_use]
pub fn import_refers_to(import: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    import == name
        || import
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|segment| segment == name)
}

static CONTROL_FLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|else|for|while|match|try|catch|except)\b")
        .expect("control flow regex is valid")
});

static OPERATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+\-*/%=&|!]{2,}").expect("operator regex is valid"));

/// Heuristic complexity: control-flow keywords + operator runs + 2 per `{`.
#[must_use]
pub fn complexity(content: &str) -> u32 {
    let score = CONTROL_FLOW.find_iter(content).count()
        + OPERATOR_RUN.find_iter(content).count()
        + content.matches('{').count() * 2;
    u32::try_from(score).unwrap_or(u32::MAX)
}

/// 1-based line number of byte offset `at`. Offsets inside a multibyte
/// character count toward that character's line.
pub(crate) fn line_at(content: &str, at: usize) -> usize {
    let mut at = at.min(content.len());
    while !content.is_char_boundary(at) {
        at -= 1;
    }
    content[..at].matches('\n').count() + 1
}

/// Byte offset just past the end of the declaration starting at `start`.
///
/// Scans forward counting braces and ends at the brace that closes the first
/// one opened. A `;` reached outside parentheses before any brace ends a
/// body-less declaration. Unbalanced input runs to the end of `content`.
pub(crate) fn brace_extent(content: &str, start: usize) -> usize {
    let mut depth = 0usize;
    let mut parens = 0usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '(' | '[' => parens += 1,
            ')' | ']' => parens = parens.saturating_sub(1),
            '{' => depth += 1,
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            ';' if depth == 0 && parens == 0 => return start + offset + 1,
            _ => {}
        }
    }
    content.len()
}

/// Declaration text up to its body, collapsed to a single line.
pub(crate) fn one_line_signature(declaration: &str) -> String {
    let head = declaration.find('{').map_or_else(
        || declaration.trim_end().trim_end_matches(';'),
        |i| &declaration[..i],
    );
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn python_imports() {
        let src = "import os\nfrom cache import Lru\n  import json\nx = 1\n";
        assert_eq!(extract_imports(src, "py"), vec!["os", "cache", "json"]);
    }

    #[test]
    fn rust_imports() {
        let src = "use std::sync::Arc;\nuse crate::{graph, cache};\nfn main() {}\n";
        assert_eq!(
            extract_imports(src, "rs"),
            vec!["std::sync::Arc", "crate::{graph, cache}"]
        );
    }

    #[test]
    fn script_imports() {
        let src = "import { a } from './cache';\nimport \"./styles.css\";\nconst x = 1;\n";
        assert_eq!(extract_imports(src, "ts"), vec!["./cache", "./styles.css"]);
        assert!(extract_imports(src, "md").is_empty());
    }

    #[test]
    fn import_segments() {
        assert!(import_refers_to("crate::cache::Lru", "cache"));
        assert!(import_refers_to("crate::{graph, cache}", "graph"));
        assert!(import_refers_to("./cache.js", "cache"));
        assert!(import_refers_to("cache", "cache"));
        assert!(!import_refers_to("crate::caches", "cache"));
        assert!(!import_refers_to("cache", ""));
    }

    #[test]
    fn complexity_counts_all_three_signals() {
        assert_eq!(complexity("plain text"), 0);
        // if + else, `==`, two braces
        assert_eq!(complexity("if a == b { x } else { y }"), 2 + 1 + 4);
        assert_eq!(complexity("try:\n  pass\nexcept E:\n  pass"), 2);
    }

    #[test]
    fn extent_tracks_nesting() {
        let src = "fn a() { if x { y } }\nfn b() {}";
        let end = brace_extent(src, 0);
        assert_eq!(&src[..end], "fn a() { if x { y } }");
    }

    #[test]
    fn extent_stops_at_bodyless_declaration() {
        let src = "fn decl(x: [u8; 4]);\nfn next() {}";
        let end = brace_extent(src, 0);
        assert_eq!(&src[..end], "fn decl(x: [u8; 4]);");
    }

    #[test]
    fn extent_unbalanced_runs_to_end() {
        let src = "fn broken() { {";
        assert_eq!(brace_extent(src, 0), src.len());
    }

    #[test]
    fn bodyless_signature_drops_semicolon() {
        assert_eq!(one_line_signature("fn decl(x: [u8; 4]);"), "fn decl(x: [u8; 4])");
    }

    #[test]
    fn signature_is_single_line() {
        assert_eq!(
            one_line_signature("pub fn f(\n    a: u8,\n    b: u8,\n) -> u8 {\n a }"),
            "pub fn f( a: u8, b: u8, ) -> u8"
        );
    }

    #[test]
    fn unknown_extension_chunks() {
        let ex = EntityExtractor::new(2);
        let entities = ex.extract("notes.txt", "a\nb\nc\n");
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.kind == crate::entity::EntityKind::Chunk));
    }

    struct Failing;

    impl LanguageStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _: &str, _: &str) -> Result<Vec<CodeEntity>> {
            Err(crate::error::IndexError::Parse("boom".into()))
        }
    }

    #[test]
    fn failing_strategy_falls_back_to_chunks() {
        let mut ex = EntityExtractor::bare(50);
        ex.register(".py", Arc::new(Failing));
        let entities = ex.extract("a.py", "import os\nprint(1)\n");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, crate::entity::EntityKind::Chunk);
        assert_eq!(entities[0].imports, vec!["os"]);
    }

    #[test]
    fn strategy_finding_nothing_still_indexes_text() {
        let ex = EntityExtractor::default();
        let entities = ex.extract("consts.rs", "const A: u8 = 1;\n");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, crate::entity::EntityKind::Chunk);
    }

    #[test]
    fn blank_file_yields_nothing() {
        let ex = EntityExtractor::default();
        assert!(ex.extract("empty.rs", "\n  \n").is_empty());
    }

    #[test]
    fn line_inside_multibyte_char() {
        let src = "a\ncafé";
        // byte 5 is the second byte of 'é'
        assert!(!src.is_char_boundary(5));
        assert_eq!(line_at(src, 5), 2);
        assert_eq!(line_at(src, 99), 2);
    }

    #[test]
    fn truncated_rust_ending_in_multibyte_char() {
        let ex = EntityExtractor::default();
        let entities = ex.extract("src/wip.rs", "fn draft() {\n    let s = \"café");
        let draft = entities.iter().find(|e| e.name == "draft").unwrap();
        assert_eq!((draft.start_line, draft.end_line), (1, 2));
    }

    #[test]
    fn truncated_script_ending_in_multibyte_char() {
        let ex = EntityExtractor::default();
        let entities = ex.extract("src/wip.ts", "function draft() {\n  // —");
        let draft = entities.iter().find(|e| e.name == "draft").unwrap();
        assert_eq!((draft.start_line, draft.end_line), (1, 2));
    }

    proptest! {
        #[test]
        fn arbitrary_source_never_inverts_lines(
            src in "(fn |function |class |def |impl |[{}();\n a-zé—🦀]){0,60}",
            ext in prop::sample::select(vec!["rs", "ts", "js", "py", "txt"]),
        ) {
            let ex = EntityExtractor::default();
            for entity in ex.extract(&format!("src/gen.{ext}"), &src) {
                prop_assert!(entity.start_line >= 1);
                prop_assert!(entity.start_line <= entity.end_line);
            }
        }
    }
}
