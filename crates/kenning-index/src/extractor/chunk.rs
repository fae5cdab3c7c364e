use crate::entity::{CodeEntity, EntityKind};

/// Cut `content` into `size`-line chunks. The trailing partial chunk is kept;
/// chunks that are only whitespace are dropped.
#[must_use]
pub fn chunk_by_lines(file_path: &str, content: &str, size: usize) -> Vec<CodeEntity> {
    let size = size.max(1);
    let lines: Vec<&str> = content.lines().collect();

    lines
        .chunks(size)
        .enumerate()
        .filter_map(|(i, window)| {
            let text = window.join("\n");
            if text.trim().is_empty() {
                return None;
            }
            let start = i * size + 1;
            let end = start + window.len() - 1;
            let mut entity =
                CodeEntity::new(EntityKind::Chunk, format!("chunk_{i}"), file_path, start, end, text);
            entity
                .metadata
                .insert("fallback".into(), serde_json::Value::Bool(true));
            Some(entity)
        })
        .collect()
}
