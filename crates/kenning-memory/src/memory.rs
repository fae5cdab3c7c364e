//! Durable free-form memories: insights, facts, decisions, todos, and the
//! evolution notes written when an entity changes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedder::Embedder;
use crate::error::MemoryError;
use crate::vector_store::{FieldValue, VectorFilter, VectorPoint, VectorStore};

pub const MEMORY_COLLECTION: &str = "kenning_memories";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Insight,
    Fact,
    Decision,
    Todo,
    Evolution,
}

impl MemoryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insight => "insight",
            Self::Fact => "fact",
            Self::Decision => "decision",
            Self::Todo => "todo",
            Self::Evolution => "evolution",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insight" => Ok(Self::Insight),
            "fact" => Ok(Self::Fact),
            "decision" => Ok(Self::Decision),
            "todo" => Ok(Self::Todo),
            "evolution" => Ok(Self::Evolution),
            other => Err(MemoryError::UnknownKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    pub kind: MemoryKind,
    /// Free-form anchor, usually the file path the memory is about.
    pub context: String,
    pub timestamp: f64,
}

impl MemoryRecord {
    #[must_use]
    pub fn new(content: impl Into<String>, kind: MemoryKind, context: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind,
            context: context.into(),
            timestamp: crate::unix_timestamp(),
        }
    }
}

/// A memory returned by recall. `distance` is `1 - cosine similarity`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalledMemory {
    pub record: MemoryRecord,
    pub distance: f32,
}

#[derive(Clone)]
pub struct MemoryStore {
    store: Arc<dyn VectorStore>,
    embedder: Embedder,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Embedder) -> Self {
        Self { store, embedder }
    }

    /// # Errors
    ///
    /// Returns an error if the backing collection cannot be created.
    pub async fn ensure_collection(&self) -> Result<(), MemoryError> {
        self.store
            .ensure_collection(MEMORY_COLLECTION, self.embedder.dimension() as u64)
            .await?;
        Ok(())
    }

    /// Store a memory and return its point id.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the upsert fails.
    pub async fn remember(&self, record: MemoryRecord) -> Result<String, MemoryError> {
        let vector = self
            .embedder
            .embed(&format!("{}: {} {}", record.kind, record.content, record.context))
            .await;
        let id = uuid::Uuid::new_v4().to_string();

        let payload = match serde_json::to_value(&record)? {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };

        self.store
            .upsert(
                MEMORY_COLLECTION,
                vec![VectorPoint {
                    id: id.clone(),
                    vector,
                    payload,
                }],
            )
            .await?;
        tracing::debug!(kind = %record.kind, context = %record.context, "memory stored");
        Ok(id)
    }

    /// Memories closest to `query`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector search fails.
    pub async fn recall(&self, query: &str, limit: usize) -> Result<Vec<RecalledMemory>, MemoryError> {
        self.search(query, limit, None).await
    }

    /// Like [`recall`](Self::recall), restricted to memories whose context
    /// contains `context` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the vector search fails.
    pub async fn recall_in_context(
        &self,
        query: &str,
        context: &str,
        limit: usize,
    ) -> Result<Vec<RecalledMemory>, MemoryError> {
        let filter = VectorFilter::must("context", FieldValue::Contains(context.to_owned()));
        self.search(query, limit, Some(filter)).await
    }

    /// Total stored memories.
    ///
    /// # Errors
    ///
    /// Returns an error if the scroll fails.
    pub async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.store.scroll(MEMORY_COLLECTION, None).await?.len())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<RecalledMemory>, MemoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await;
        let hits = self
            .store
            .search(MEMORY_COLLECTION, vector, limit as u64, filter)
            .await?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let value = serde_json::Value::Object(hit.payload.into_iter().collect());
            match serde_json::from_value::<MemoryRecord>(value) {
                Ok(record) => out.push(RecalledMemory {
                    record,
                    distance: 1.0 - hit.score,
                }),
                Err(e) => tracing::warn!(id = %hit.id, "skipping malformed memory: {e}"),
            }
        }
        Ok(out)
    }
}
