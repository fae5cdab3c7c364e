//! Vector storage, never-failing embeddings, and durable memory records.

pub mod embedder;
pub mod error;
pub mod in_memory_store;
pub mod memory;
pub mod vector_store;

pub use embedder::Embedder;
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use memory::{MemoryKind, MemoryRecord, MemoryStore, RecalledMemory};
pub use vector_store::VectorStore;

/// Seconds since the unix epoch as a float, the timestamp format of stored rows.
#[must_use]
pub fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
