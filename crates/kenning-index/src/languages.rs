//! Language detection by file extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Rust,
    TypeScript,
    JavaScript,
}

impl Lang {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
        }
    }

    /// File extensions (without the dot) handled by this language.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py"],
            Self::Rust => &["rs"],
            Self::TypeScript => &["ts", "tsx"],
            Self::JavaScript => &["js"],
        }
    }

    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    Lang::from_extension(path.extension()?.to_str()?)
}

/// Whether the indexer and watcher should pick this file up.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    detect_language(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_extensions() {
        assert_eq!(detect_language(Path::new("a/b.py")), Some(Lang::Python));
        assert_eq!(detect_language(Path::new("lib.rs")), Some(Lang::Rust));
        assert_eq!(detect_language(Path::new("App.tsx")), Some(Lang::TypeScript));
        assert_eq!(detect_language(Path::new("x.ts")), Some(Lang::TypeScript));
        assert_eq!(detect_language(Path::new("x.js")), Some(Lang::JavaScript));
    }

    #[test]
    fn rejects_others() {
        assert!(!is_indexable(Path::new("Cargo.toml")));
        assert!(!is_indexable(Path::new("README")));
        assert!(!is_indexable(Path::new("x.pyc")));
    }

    #[test]
    fn extensions_map_back() {
        for lang in [Lang::Python, Lang::Rust, Lang::TypeScript, Lang::JavaScript] {
            for ext in lang.extensions() {
                assert_eq!(Lang::from_extension(ext), Some(lang));
            }
        }
    }
}
