//! Change detection between two extraction passes over the same file.

use std::collections::BTreeMap;
use std::path::Path;

use kenning_memory::{MemoryKind, MemoryRecord};
use serde::Serialize;

use crate::entity::CodeEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evolution {
    pub change: Change,
    pub name: String,
    pub description: String,
}

impl Evolution {
    /// Memory anchored to the file the change happened in.
    #[must_use]
    pub fn to_memory(&self, file_path: &str) -> MemoryRecord {
        MemoryRecord::new(self.description.clone(), MemoryKind::Evolution, file_path)
    }
}

/// Compare the function, method and class entities of two passes by name.
///
/// Modifications and creations come first in name order, then deletions.
#[must_use]
pub fn track_evolution(file_path: &str, old: &[CodeEntity], new: &[CodeEntity]) -> Vec<Evolution> {
    let file_name = Path::new(file_path)
        .file_name()
        .map_or_else(|| file_path.to_owned(), |n| n.to_string_lossy().into_owned());
    let old_map = definitions(old);
    let new_map = definitions(new);

    let mut changes = Vec::new();
    for (name, current) in &new_map {
        match old_map.get(name) {
            Some(previous) => {
                if previous.content.trim() == current.content.trim() {
                    continue;
                }
                let mut description = format!(
                    "Modified {} '{}' in {file_name}",
                    current.kind, current.name
                );
                if previous.signature != current.signature {
                    description.push_str(&format!(
                        " (signature changed: {} -> {})",
                        previous.signature.as_deref().unwrap_or(""),
                        current.signature.as_deref().unwrap_or("")
                    ));
                }
                changes.push(Evolution {
                    change: Change::Modified,
                    name: (*name).to_owned(),
                    description,
                });
            }
            None => changes.push(Evolution {
                change: Change::Created,
                name: (*name).to_owned(),
                description: format!(
                    "Created new {} '{}' in {file_name}",
                    current.kind, current.name
                ),
            }),
        }
    }
    for (name, previous) in &old_map {
        if !new_map.contains_key(name) {
            changes.push(Evolution {
                change: Change::Deleted,
                name: (*name).to_owned(),
                description: format!(
                    "Deleted {} '{}' from {file_name}",
                    previous.kind, previous.name
                ),
            });
        }
    }
    changes
}

/// Later entities shadow earlier ones with the same name.
fn definitions(entities: &[CodeEntity]) -> BTreeMap<&str, &CodeEntity> {
    entities
        .iter()
        .filter(|e| e.kind.is_definition())
        .map(|e| (e.name.as_str(), e))
        .collect()
}
