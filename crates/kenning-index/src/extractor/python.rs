//! Python declarations via tree-sitter.

use std::path::Path;

use tree_sitter::{Node, Parser};

use super::LanguageStrategy;
use crate::entity::{CodeEntity, EntityKind};
use crate::error::{IndexError, Result};

/// Characters of file content kept on the module entity.
const MODULE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonStrategy;

struct Ctx<'a> {
    source: &'a str,
    file_path: &'a str,
    lines: Vec<&'a str>,
}

impl Ctx<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_owned())
    }

    fn slice_lines(&self, start: usize, end: usize) -> String {
        let end = end.min(self.lines.len());
        if start == 0 || start > end {
            return String::new();
        }
        self.lines[start - 1..end].join("\n")
    }
}

impl LanguageStrategy for PythonStrategy {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(&self, file_path: &str, content: &str) -> Result<Vec<CodeEntity>> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| IndexError::Parse(format!("parse failed for {file_path}")))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(IndexError::Parse(format!("syntax error in {file_path}")));
        }

        let ctx = Ctx {
            source: content,
            file_path,
            lines: content.lines().collect(),
        };

        let mut out = Vec::new();
        if let Some(module) = module_entity(&ctx, root) {
            out.push(module);
        }
        walk(&ctx, root, false, &mut out);
        Ok(out)
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
    (0..count).filter_map(|i| node.named_child(i)).collect()
}

fn walk(ctx: &Ctx<'_>, node: Node<'_>, in_class: bool, out: &mut Vec<CodeEntity>) {
    for child in named_children(node) {
        let (def, decorators) = unwrap_decorated(ctx, child);
        match def.kind() {
            "function_definition" => {
                out.push(function_entity(ctx, def, in_class, decorators));
                if let Some(body) = def.child_by_field_name("body") {
                    walk(ctx, body, false, out);
                }
            }
            "class_definition" => {
                out.push(class_entity(ctx, def));
                if let Some(body) = def.child_by_field_name("body") {
                    walk(ctx, body, true, out);
                }
            }
            _ => walk(ctx, child, in_class, out),
        }
    }
}

/// `@decorator def f()` → (`def f()`, `["decorator"]`). Only bare-name
/// decorators are recorded.
fn unwrap_decorated<'t>(ctx: &Ctx<'_>, node: Node<'t>) -> (Node<'t>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }
    let Some(def) = node.child_by_field_name("definition") else {
        return (node, Vec::new());
    };
    let decorators = named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|c| ctx.text(c).trim_start_matches('@').trim().to_owned())
        .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_alphanumeric() || c == '_'))
        .collect();
    (def, decorators)
}

fn line_span(node: Node<'_>) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

fn function_entity(
    ctx: &Ctx<'_>,
    def: Node<'_>,
    in_class: bool,
    decorators: Vec<String>,
) -> CodeEntity {
    let name = ctx.field_text(def, "name").unwrap_or_default();
    let params = def
        .child_by_field_name("parameters")
        .map(|p| parameter_names(ctx, p))
        .unwrap_or_default();
    let (start, end) = line_span(def);
    let kind = if in_class {
        EntityKind::Method
    } else {
        EntityKind::Function
    };

    let mut entity = CodeEntity::new(
        kind,
        name.clone(),
        ctx.file_path,
        start,
        end,
        ctx.slice_lines(start, end),
    );
    entity.doc = docstring(ctx, def);
    entity.signature = Some(format!("def {name}({})", params.join(", ")));
    entity.exports = vec![name];
    entity
        .metadata
        .insert("decorators".into(), serde_json::json!(decorators));
    entity
}

fn parameter_names(ctx: &Ctx<'_>, params: Node<'_>) -> Vec<String> {
    named_children(params)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "identifier" => Some(ctx.text(p).to_owned()),
            "default_parameter" | "typed_default_parameter" => ctx.field_text(p, "name"),
            "typed_parameter" => named_children(p)
                .into_iter()
                .find(|c| c.kind() == "identifier")
                .map(|c| ctx.text(c).to_owned()),
            _ => None,
        })
        .collect()
}

fn class_entity(ctx: &Ctx<'_>, def: Node<'_>) -> CodeEntity {
    let name = ctx.field_text(def, "name").unwrap_or_default();
    let bases: Vec<String> = def
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .map(|b| ctx.text(b).to_owned())
                .collect()
        })
        .unwrap_or_default();
    let methods: Vec<String> = def
        .child_by_field_name("body")
        .map(|body| {
            named_children(body)
                .into_iter()
                .map(|c| unwrap_decorated(ctx, c).0)
                .filter(|c| c.kind() == "function_definition")
                .filter_map(|c| ctx.field_text(c, "name"))
                .collect()
        })
        .unwrap_or_default();

    let (start, end) = line_span(def);
    let mut entity = CodeEntity::new(
        EntityKind::Class,
        name.clone(),
        ctx.file_path,
        start,
        end,
        ctx.slice_lines(start, end),
    );
    entity.doc = docstring(ctx, def);
    entity.signature = Some(format!("class {name}"));
    entity.exports = std::iter::once(name).chain(methods.iter().cloned()).collect();
    entity
        .metadata
        .insert("methods".into(), serde_json::json!(methods));
    entity
        .metadata
        .insert("bases".into(), serde_json::json!(bases));
    entity
}

/// Docstring of a function or class: the string statement opening its body.
fn docstring(ctx: &Ctx<'_>, def: Node<'_>) -> Option<String> {
    let body = def.child_by_field_name("body")?;
    leading_string(ctx, body)
}

fn leading_string(ctx: &Ctx<'_>, block: Node<'_>) -> Option<String> {
    let first = named_children(block)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    (string.kind() == "string").then(|| clean_docstring(ctx.text(string)))
}

fn module_entity(ctx: &Ctx<'_>, root: Node<'_>) -> Option<CodeEntity> {
    let doc = leading_string(ctx, root)?;
    let first = named_children(root)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    let path = Path::new(ctx.file_path);
    let file_name = path
        .file_name()
        .map_or_else(|| ctx.file_path.to_owned(), |n| n.to_string_lossy().into_owned());
    let stem = path
        .file_stem()
        .map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned());

    let preview: String = ctx.source.chars().take(MODULE_PREVIEW_CHARS).collect();
    let mut entity = CodeEntity::new(
        EntityKind::Module,
        file_name,
        ctx.file_path,
        1,
        first.end_position().row + 1,
        preview,
    );
    entity.doc = Some(doc);
    entity.signature = Some(format!("module {stem}"));
    entity
        .metadata
        .insert("module_level".into(), serde_json::Value::Bool(true));
    Some(entity)
}

/// Strip string prefix and quotes, then trim each line.
fn clean_docstring(raw: &str) -> String {
    let unprefixed = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| {
            (unprefixed.len() >= 2 * q.len() && unprefixed.starts_with(q) && unprefixed.ends_with(q))
                .then(|| &unprefixed[q.len()..unprefixed.len() - q.len()])
        })
        .unwrap_or(unprefixed);
    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#""""Cache helpers.

Keeps recently used entries around.
"""
import os
from store import Backend


def load_config(path, strict=False, *args, retries: int = 3):
    """Read the config file."""
    if strict:
        return None
    return open(path).read()


class SmartCache(Backend, dict):
    """LRU cache."""

    def get(self, key):
        return self.data.get(key)

    @staticmethod
    def size():
        return 0
"#;

    fn extract() -> Vec<CodeEntity> {
        PythonStrategy.extract("pkg/cache.py", SOURCE).unwrap()
    }

    fn by_name<'a>(entities: &'a [CodeEntity], name: &str) -> &'a CodeEntity {
        entities.iter().find(|e| e.name == name).unwrap()
    }

    #[test]
    fn module_docstring_entity() {
        let entities = extract();
        let module = &entities[0];
        assert_eq!(module.kind, EntityKind::Module);
        assert_eq!(module.name, "cache.py");
        assert_eq!(module.start_line, 1);
        assert_eq!(module.end_line, 4);
        assert!(module.doc.as_deref().unwrap().starts_with("Cache helpers."));
        assert_eq!(module.signature.as_deref(), Some("module cache"));
    }

    #[test]
    fn function_signature_doc_and_lines() {
        let entities = extract();
        let f = by_name(&entities, "load_config");
        assert_eq!(f.kind, EntityKind::Function);
        assert_eq!(f.signature.as_deref(), Some("def load_config(path, strict, retries)"));
        assert_eq!(f.doc.as_deref(), Some("Read the config file."));
        assert_eq!((f.start_line, f.end_line), (9, 13));
        assert!(f.content.starts_with("def load_config"));
        assert_eq!(f.id, "pkg/cache.py:9");
    }

    #[test]
    fn class_exports_methods() {
        let entities = extract();
        let c = by_name(&entities, "SmartCache");
        assert_eq!(c.kind, EntityKind::Class);
        assert_eq!(c.exports, vec!["SmartCache", "get", "size"]);
        assert_eq!(c.metadata["bases"], serde_json::json!(["Backend", "dict"]));
        assert_eq!(c.doc.as_deref(), Some("LRU cache."));
    }

    #[test]
    fn methods_are_marked() {
        let entities = extract();
        assert_eq!(by_name(&entities, "get").kind, EntityKind::Method);
        let size = by_name(&entities, "size");
        assert_eq!(size.kind, EntityKind::Method);
        assert_eq!(size.metadata["decorators"], serde_json::json!(["staticmethod"]));
    }

    #[test]
    fn no_module_entity_without_docstring() {
        let entities = PythonStrategy.extract("a.py", "def f():\n    pass\n").unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::Function);
    }

    #[test]
    fn syntax_error_is_reported() {
        assert!(PythonStrategy.extract("bad.py", "def broken(:\n  pass\n").is_err());
    }

    #[test]
    fn nested_function_in_method_is_a_function() {
        let src = "class A:\n    def m(self):\n        def inner():\n            pass\n        return inner\n";
        let entities = PythonStrategy.extract("a.py", src).unwrap();
        assert_eq!(by_name(&entities, "m").kind, EntityKind::Method);
        assert_eq!(by_name(&entities, "inner").kind, EntityKind::Function);
    }

    #[test]
    fn docstring_cleanup() {
        assert_eq!(clean_docstring("r'''  a\n    b  '''"), "a\nb");
        assert_eq!(clean_docstring("\"x\""), "x");
    }
}
