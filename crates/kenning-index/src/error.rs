//! Error types for kenning-index.

/// Errors that can occur during indexing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index has not finished initializing.
    #[error("index is not ready yet")]
    NotReady,

    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector store error: {0}")]
    VectorStore(#[from] kenning_memory::vector_store::VectorStoreError),

    #[error("memory error: {0}")]
    Memory(#[from] kenning_memory::MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A language strategy could not parse the source.
    #[error("parse failed: {0}")]
    Parse(String),

    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
