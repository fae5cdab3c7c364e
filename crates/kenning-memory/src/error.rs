#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown memory kind: {0}")]
    UnknownKind(String),
}
