//! Incremental semantic code index with intent-aware hybrid retrieval.
//!
//! Source files are cut into [`CodeEntity`] values (functions, classes,
//! module docs, line chunks), linked into a [`DependencyGraph`] by
//! import/export names, embedded into a vector store, and searched with
//! re-ranking driven by the recognized intent of the query.

pub mod ask;
pub mod cache;
pub mod context;
pub mod doctor;
pub mod entity;
pub mod error;
pub mod evolution;
pub mod extractor;
pub mod gatekeeper;
pub mod graph;
pub mod indexer;
pub mod intent;
pub mod languages;
pub mod retriever;
pub mod store;
pub mod watcher;

pub use ask::Advisor;
pub use entity::{CodeEntity, EntityKind};
pub use error::{IndexError, Result};
pub use graph::DependencyGraph;
pub use indexer::{CodeIndex, IndexConfig, IndexReport, IndexStats};
pub use intent::{IntentClassifier, QueryIntent};
pub use retriever::SearchResult;
pub use watcher::{IndexWatcher, ReindexController};
