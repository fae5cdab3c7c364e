//! Rust declarations by pattern matching.
//!
//! A heuristic, not a parser: item extents come from brace counting, so braces
//! inside string or char literals, and macro-generated items, are misread.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{LanguageStrategy, brace_extent, line_at, one_line_signature};
use crate::entity::{CodeEntity, EntityKind};
use crate::error::Result;

static FN_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*(pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(\w+)"#,
    )
    .expect("fn regex is valid")
});

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(pub(?:\([^)]*\))?\s+)?(struct|enum|trait|union)\s+(\w+)")
        .expect("type regex is valid")
});

static IMPL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:unsafe\s+)?impl\b(?:\s*<[^{]*?>)?\s+(?:[\w:]+(?:<[^{]*?>)?\s+for\s+)?(?:[\w]+::)*(\w+)")
        .expect("impl regex is valid")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct RustStrategy;

struct ImplBlock {
    type_name: String,
    start: usize,
    end: usize,
}

impl LanguageStrategy for RustStrategy {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extract(&self, file_path: &str, content: &str) -> Result<Vec<CodeEntity>> {
        let impls: Vec<ImplBlock> = IMPL_BLOCK
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(ImplBlock {
                    type_name: caps.get(1)?.as_str().to_owned(),
                    start: whole.start(),
                    end: brace_extent(content, whole.start()),
                })
            })
            .collect();

        let mut entities = Vec::new();
        let mut methods_by_type: HashMap<&str, Vec<String>> = HashMap::new();

        for caps in FN_DECL.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let name = name.as_str();
            let end = brace_extent(content, whole.start());
            let text = content[whole.start()..end].trim_end_matches('\n');

            let owner = impls
                .iter()
                .find(|b| b.start < whole.start() && whole.start() < b.end);
            let kind = if owner.is_some() {
                EntityKind::Method
            } else {
                EntityKind::Function
            };

            let start_line = line_at(content, whole.start());
            let end_line = line_at(content, end.saturating_sub(1));
            let mut entity = CodeEntity::new(kind, name, file_path, start_line, end_line, text);
            entity.doc = doc_comment(content, whole.start());
            entity.signature = Some(one_line_signature(text));
            entity.exports = vec![name.to_owned()];
            entity.metadata.insert(
                "visibility".into(),
                visibility(caps.get(1).is_some()).into(),
            );
            if let Some(block) = owner {
                entity
                    .metadata
                    .insert("impl".into(), block.type_name.clone().into());
                methods_by_type
                    .entry(block.type_name.as_str())
                    .or_default()
                    .push(name.to_owned());
            }
            entities.push(entity);
        }

        for caps in TYPE_DECL.captures_iter(content) {
            let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let name = name.as_str();
            let end = brace_extent(content, whole.start());
            let text = content[whole.start()..end].trim_end_matches('\n');
            let kind = if keyword.as_str() == "trait" {
                EntityKind::Class
            } else {
                EntityKind::Struct
            };

            let mut entity = CodeEntity::new(
                kind,
                name,
                file_path,
                line_at(content, whole.start()),
                line_at(content, end.saturating_sub(1)),
                text,
            );
            entity.doc = doc_comment(content, whole.start());
            entity.signature = Some(one_line_signature(text));

            let methods = methods_by_type.get(name).cloned().unwrap_or_default();
            entity.exports = std::iter::once(name.to_owned())
                .chain(methods.iter().cloned())
                .collect();
            entity
                .metadata
                .insert("item".into(), keyword.as_str().into());
            entity.metadata.insert(
                "visibility".into(),
                visibility(caps.get(1).is_some()).into(),
            );
            entity
                .metadata
                .insert("methods".into(), serde_json::json!(methods));
            entities.push(entity);
        }

        entities.sort_by_key(|e| e.start_line);
        Ok(entities)
    }
}

fn visibility(is_pub: bool) -> &'static str {
    if is_pub { "pub" } else { "private" }
}

/// `///` lines directly above the item at `at`, skipping attributes.
fn doc_comment(content: &str, at: usize) -> Option<String> {
    let mut doc: Vec<&str> = Vec::new();
    for line in content[..at].lines().rev() {
        let line = line.trim();
        if let Some(text) = line.strip_prefix("///") {
            doc.push(text.trim());
        } else if !line.starts_with("#[") {
            break;
        }
    }
    if doc.is_empty() {
        return None;
    }
    doc.reverse();
    Some(doc.join("\n"))
}
