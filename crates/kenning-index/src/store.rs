//! Entity rows in the vector store, keyed by file path.

use std::collections::HashMap;
use std::sync::Arc;

use kenning_memory::VectorStore;
use kenning_memory::vector_store::{FieldValue, VectorFilter, VectorPoint};
use serde::{Deserialize, Serialize};

use crate::entity::{CodeEntity, EntityKind};
use crate::error::Result;

pub const ENTITY_COLLECTION: &str = "kenning_entities";

/// Flat payload of one stored entity. `metadata` is kept as an opaque
/// JSON string.
#[derive(Debug, Serialize, Deserialize)]
struct EntityRow {
    entity_id: String,
    kind: EntityKind,
    name: String,
    content: String,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    file_path: String,
    start_line: usize,
    end_line: usize,
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    exports: Vec<String>,
    #[serde(default)]
    complexity: u32,
    #[serde(default)]
    metadata: String,
    #[serde(default)]
    timestamp: f64,
}

impl EntityRow {
    fn from_entity(entity: &CodeEntity) -> Result<Self> {
        Ok(Self {
            entity_id: entity.id.clone(),
            kind: entity.kind,
            name: entity.name.clone(),
            content: entity.content.clone(),
            doc: entity.doc.clone(),
            signature: entity.signature.clone(),
            file_path: entity.file_path.clone(),
            start_line: entity.start_line,
            end_line: entity.end_line,
            imports: entity.imports.clone(),
            exports: entity.exports.clone(),
            complexity: entity.complexity,
            metadata: serde_json::to_string(&entity.metadata)?,
            timestamp: kenning_memory::unix_timestamp(),
        })
    }

    fn into_entity(self) -> CodeEntity {
        let metadata = serde_json::from_str(&self.metadata).unwrap_or_default();
        CodeEntity {
            id: self.entity_id,
            kind: self.kind,
            name: self.name,
            content: self.content,
            doc: self.doc,
            signature: self.signature,
            file_path: self.file_path,
            start_line: self.start_line,
            end_line: self.end_line.max(self.start_line),
            imports: self.imports,
            exports: self.exports,
            complexity: self.complexity,
            metadata,
            vector: None,
        }
    }
}

/// A stored entity with its distance to the query: `1 - cosine`, lower is closer.
#[derive(Debug, Clone)]
pub struct EntityHit {
    pub entity: CodeEntity,
    pub distance: f32,
}

#[derive(Clone)]
pub struct EntityStore {
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}

impl EntityStore {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns an error if the collection cannot be created.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        self.store
            .ensure_collection(ENTITY_COLLECTION, dimension as u64)
            .await?;
        Ok(())
    }

    /// Insert entities that already carry a vector. Entities without one are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload cannot be serialized or the upsert fails.
    pub async fn insert(&self, entities: &[CodeEntity]) -> Result<usize> {
        let mut points = Vec::with_capacity(entities.len());
        for entity in entities {
            let Some(vector) = entity.vector.clone() else {
                continue;
            };
            let payload: HashMap<String, serde_json::Value> =
                match serde_json::to_value(EntityRow::from_entity(entity)?)? {
                    serde_json::Value::Object(map) => map.into_iter().collect(),
                    _ => HashMap::new(),
                };
            points.push(VectorPoint {
                id: point_id(&entity.id),
                vector,
                payload,
            });
        }
        let inserted = points.len();
        if inserted > 0 {
            self.store.upsert(ENTITY_COLLECTION, points).await?;
        }
        Ok(inserted)
    }

    /// Remove every row whose file path equals `file_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_file(&self, file_path: &str) -> Result<usize> {
        let filter = VectorFilter::must("file_path", FieldValue::Text(file_path.to_owned()));
        Ok(self.store.delete_by_filter(ENTITY_COLLECTION, filter).await?)
    }

    /// Rows whose file path contains `pattern`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the scroll fails.
    pub async fn count_matching(&self, pattern: &str) -> Result<usize> {
        let filter = path_contains(pattern);
        Ok(self.store.scroll(ENTITY_COLLECTION, Some(filter)).await?.len())
    }

    /// Delete rows whose file path contains `pattern`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_matching(&self, pattern: &str) -> Result<usize> {
        Ok(self
            .store
            .delete_by_filter(ENTITY_COLLECTION, path_contains(pattern))
            .await?)
    }

    /// Nearest entities to `vector`, closest first. Rows that cannot be
    /// decoded are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector search fails.
    pub async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<EntityHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let hits = self
            .store
            .search(ENTITY_COLLECTION, vector, limit as u64, None)
            .await?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let value = serde_json::Value::Object(hit.payload.into_iter().collect());
            match serde_json::from_value::<EntityRow>(value) {
                Ok(row) => out.push(EntityHit {
                    entity: row.into_entity(),
                    distance: 1.0 - hit.score,
                }),
                Err(e) => tracing::warn!(id = %hit.id, "skipping malformed entity row: {e}"),
            }
        }
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns an error if the scroll fails.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.scroll(ENTITY_COLLECTION, None).await?.len())
    }
}

fn path_contains(pattern: &str) -> VectorFilter {
    VectorFilter::must("file_path", FieldValue::Contains(pattern.to_owned()))
}

/// Stable point id for an entity id, so reinserting overwrites.
fn point_id(entity_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, entity_id.as_bytes()).to_string()
}
