//! TypeScript and JavaScript declarations by pattern matching.
//!
//! Heuristic like the Rust strategy: brace counting for extents, so template
//! literals containing braces and deeply nested arrow chains can be misread.

use std::sync::LazyLock;

use regex::Regex;

use super::{LanguageStrategy, brace_extent, line_at, one_line_signature};
use crate::entity::{CodeEntity, EntityKind};
use crate::error::Result;

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(export\s+)?(?:default\s+)?(?:async\s+)?function\*?\s+(\w+)\s*[(<]")
        .expect("function regex is valid")
});

static ARROW_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(export\s+)?(?:const|let)\s+(\w+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*(?::\s*[^=]+)?=>",
    )
    .expect("arrow regex is valid")
});

static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)")
        .expect("class regex is valid")
});

static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]+(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*(\w+)\s*\([^)]*\)\s*(?::\s*[^{;]+)?\{",
    )
    .expect("method regex is valid")
});

const NOT_METHODS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptStrategy;

impl LanguageStrategy for ScriptStrategy {
    fn name(&self) -> &'static str {
        "script"
    }

    fn extract(&self, file_path: &str, content: &str) -> Result<Vec<CodeEntity>> {
        let mut entities = Vec::new();
        let mut class_spans: Vec<(usize, usize)> = Vec::new();

        for caps in CLASS_DECL.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let end = brace_extent(content, whole.start());
            class_spans.push((whole.start(), end));
            let text = content[whole.start()..end].trim_end_matches('\n');
            let name = name.as_str();

            let body_start = text.find('{').map_or(text.len(), |i| i + 1);
            let mut methods: Vec<CodeEntity> = Vec::new();
            let mut last_end = 0;
            for m in METHOD_DECL.captures_iter(&text[body_start..]) {
                let (Some(m_whole), Some(m_name)) = (m.get(0), m.get(1)) else {
                    continue;
                };
                let at = whole.start() + body_start + m_whole.start();
                if at < last_end || NOT_METHODS.contains(&m_name.as_str()) {
                    continue;
                }
                let m_end = brace_extent(content, at);
                last_end = m_end;
                let m_text = content[at..m_end].trim_end_matches('\n');
                let mut method = CodeEntity::new(
                    EntityKind::Method,
                    m_name.as_str(),
                    file_path,
                    line_at(content, at),
                    line_at(content, m_end.saturating_sub(1)),
                    m_text,
                );
                method.signature = Some(one_line_signature(m_text));
                method.exports = vec![m_name.as_str().to_owned()];
                method.metadata.insert("class".into(), name.into());
                methods.push(method);
            }

            let method_names: Vec<String> = methods.iter().map(|m| m.name.clone()).collect();
            let mut class = CodeEntity::new(
                EntityKind::Class,
                name,
                file_path,
                line_at(content, whole.start()),
                line_at(content, end.saturating_sub(1)),
                text,
            );
            class.signature = Some(one_line_signature(text));
            class.exports = std::iter::once(name.to_owned())
                .chain(method_names.iter().cloned())
                .collect();
            class
                .metadata
                .insert("exported".into(), caps.get(1).is_some().into());
            class
                .metadata
                .insert("methods".into(), serde_json::json!(method_names));
            entities.push(class);
            entities.extend(methods);
        }

        let in_class = |at: usize| class_spans.iter().any(|&(s, e)| s < at && at < e);

        for (pattern, arrow) in [(&*FUNCTION_DECL, false), (&*ARROW_DECL, true)] {
            for caps in pattern.captures_iter(content) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                    continue;
                };
                if in_class(whole.start()) {
                    continue;
                }
                let end = brace_extent(content, whole.start());
                let text = content[whole.start()..end].trim_end_matches('\n');
                let signature = if arrow {
                    let head = &content[whole.start()..whole.end()];
                    head.split_whitespace().collect::<Vec<_>>().join(" ")
                } else {
                    one_line_signature(text)
                };

                let mut function = CodeEntity::new(
                    EntityKind::Function,
                    name.as_str(),
                    file_path,
                    line_at(content, whole.start()),
                    line_at(content, end.saturating_sub(1)),
                    text,
                );
                function.signature = Some(signature);
                function.exports = vec![name.as_str().to_owned()];
                function
                    .metadata
                    .insert("exported".into(), caps.get(1).is_some().into());
                function.metadata.insert("arrow".into(), arrow.into());
                entities.push(function);
            }
        }

        entities.sort_by_key(|e| e.start_line);
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r"import { Store } from './store';

export async function fetchUser(id: string): Promise<User> {
  const res = await fetch(`/users/${id}`);
  return res.json();
}

export const formatName = (user: User): string => {
  return user.first + ' ' + user.last;
};

const double = (n) => n * 2;

export class UserCache extends Store {
  private entries: Map<string, User>;

  constructor() {
    super();
  }

  async get(id: string): Promise<User | undefined> {
    if (this.entries.has(id)) {
      return this.entries.get(id);
    }
    return undefined;
  }
}
";

    fn extract() -> Vec<CodeEntity> {
        ScriptStrategy.extract("src/users.ts", SOURCE).unwrap()
    }

    fn by_name<'a>(entities: &'a [CodeEntity], name: &str) -> &'a CodeEntity {
        entities.iter().find(|e| e.name == name).unwrap()
    }

    #[test]
    fn function_declaration_extent() {
        let entities = extract();
        let f = by_name(&entities, "fetchUser");
        assert_eq!(f.kind, EntityKind::Function);
        assert_eq!((f.start_line, f.end_line), (3, 6));
        assert_eq!(
            f.signature.as_deref(),
            Some("export async function fetchUser(id: string): Promise<User>")
        );
        assert_eq!(f.metadata["exported"], true);
    }

    #[test]
    fn arrow_functions() {
        let entities = extract();
        let f = by_name(&entities, "formatName");
        assert_eq!((f.start_line, f.end_line), (8, 10));
        assert_eq!(f.metadata["arrow"], true);
        let d = by_name(&entities, "double");
        assert_eq!((d.start_line, d.end_line), (12, 12));
        assert_eq!(d.metadata["exported"], false);
    }

    #[test]
    fn class_with_methods() {
        let entities = extract();
        let c = by_name(&entities, "UserCache");
        assert_eq!(c.kind, EntityKind::Class);
        assert_eq!((c.start_line, c.end_line), (14, 27));
        assert_eq!(c.exports, vec!["UserCache", "constructor", "get"]);

        let get = by_name(&entities, "get");
        assert_eq!(get.kind, EntityKind::Method);
        assert_eq!((get.start_line, get.end_line), (21, 26));
    }

    #[test]
    fn control_flow_is_not_a_method() {
        let entities = extract();
        assert!(entities.iter().all(|e| e.name != "if"));
    }

    #[test]
    fn unterminated_class_runs_to_last_line() {
        let src = "export class Draft {\n  save() {\n    return 'é";
        let entities = ScriptStrategy.extract("src/draft.ts", src).unwrap();
        let class = by_name(&entities, "Draft");
        assert_eq!((class.start_line, class.end_line), (1, 3));
        let save = by_name(&entities, "save");
        assert_eq!((save.start_line, save.end_line), (2, 3));
    }

    #[test]
    fn unicode_arrow_without_trailing_newline() {
        let src = "const grüß = (name) => {\n  return `¡hola ${name}!`;\n}";
        let entities = ScriptStrategy.extract("greet.js", src).unwrap();
        let f = by_name(&entities, "grüß");
        assert_eq!((f.start_line, f.end_line), (1, 3));
    }
}
