//! The unit of indexing: a named, typed slice of a source file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Method,
    Class,
    Struct,
    Module,
    Chunk,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Module => "module",
            Self::Chunk => "chunk",
        }
    }

    /// Function, method or class: the kinds tracked across revisions and
    /// favoured by code-finding queries.
    #[must_use]
    pub fn is_definition(self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Class)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "class" => Ok(Self::Class),
            "struct" => Ok(Self::Struct),
            "module" => Ok(Self::Module),
            "chunk" => Ok(Self::Chunk),
            other => Err(IndexError::Other(format!("unknown entity kind: {other}"))),
        }
    }
}

/// A function, class, module docstring, or line chunk extracted from a file.
///
/// Entities are replaced wholesale when their file is reindexed; nothing
/// patches one in place. Dependencies are not stored here: ask the
/// [`DependencyGraph`](crate::graph::DependencyGraph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// `"{file_path}:{start_line}"`, unique within one extraction pass.
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub content: String,
    pub doc: Option<String>,
    pub signature: Option<String>,
    pub file_path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive. Never less than `start_line`.
    pub end_line: usize,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub complexity: u32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub vector: Option<Vec<f32>>,
}

impl CodeEntity {
    /// Entity with the id derived from its location and empty optional parts.
    #[must_use]
    pub fn new(
        kind: EntityKind,
        name: impl Into<String>,
        file_path: &str,
        start_line: usize,
        end_line: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: entity_id(file_path, start_line),
            kind,
            name: name.into(),
            content: content.into(),
            doc: None,
            signature: None,
            file_path: file_path.to_owned(),
            start_line,
            end_line: end_line.max(start_line),
            imports: Vec::new(),
            exports: Vec::new(),
            complexity: 0,
            metadata: serde_json::Map::new(),
            vector: None,
        }
    }
}

#[must_use]
pub fn entity_id(file_path: &str, start_line: usize) -> String {
    format!("{file_path}:{start_line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_end_line() {
        let e = CodeEntity::new(EntityKind::Function, "f", "a.py", 10, 3, "def f(): pass");
        assert_eq!(e.id, "a.py:10");
        assert_eq!(e.end_line, 10);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            EntityKind::Function,
            EntityKind::Method,
            EntityKind::Class,
            EntityKind::Struct,
            EntityKind::Module,
            EntityKind::Chunk,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("trait".parse::<EntityKind>().is_err());
    }

    #[test]
    fn definitions() {
        assert!(EntityKind::Method.is_definition());
        assert!(!EntityKind::Struct.is_definition());
        assert!(!EntityKind::Chunk.is_definition());
    }
}
