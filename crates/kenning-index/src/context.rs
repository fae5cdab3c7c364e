//! Text renderings of entities for embedding and prompts.

use crate::entity::CodeEntity;

const EMBED_PREVIEW_CHARS: usize = 200;

/// `"{kind} {name}[ - {doc}][ | {signature}] | {content preview}"`
#[must_use]
pub fn embedding_text(entity: &CodeEntity) -> String {
    let mut text = format!("{} {}", entity.kind, entity.name);
    if let Some(doc) = entity.doc.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(" - ");
        text.push_str(doc);
    }
    if let Some(signature) = entity.signature.as_deref().filter(|s| !s.is_empty()) {
        text.push_str(" | ");
        text.push_str(signature);
    }
    text.push_str(" | ");
    text.push_str(preview(&entity.content, EMBED_PREVIEW_CHARS));
    text
}

/// The first `max_chars` characters of `text`.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}
