//! The index itself: extraction, evolution, embedding and storage per file,
//! plus the graph and entity cache that hold the current generation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use kenning_memory::{
    Embedder, MemoryKind, MemoryRecord, MemoryStore, RecalledMemory, VectorStore,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::context::embedding_text;
use crate::entity::CodeEntity;
use crate::error::{IndexError, Result};
use crate::evolution::track_evolution;
use crate::extractor::{DEFAULT_CHUNK_LINES, EntityExtractor, import_refers_to};
use crate::graph::DependencyGraph;
use crate::languages::is_indexable;
use crate::retriever::{CodeRetriever, QueryRecord, SearchResult};
use crate::store::EntityStore;

/// Directory names never descended into, on top of hidden directories.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "dist",
    "build",
    "gen",
    "coverage",
    ".git",
    ".vscode",
    ".idea",
    ".cargo",
    ".cursor-rust-tools",
    ".venv",
    "__pycache__",
    "src-python",
    "data",
    ".openmcp",
    ".gemini",
    ".claude",
    ".agent",
    "imports",
    "IMPORTS",
    "assets",
    "public",
    "docs",
    "icons",
    "resources",
    "capabilities",
    "backups",
    "logs",
    "tmp",
    "tools",
    "mcp-server",
    "_legacy",
];

const RECENT_QUERIES: usize = 5;
const GRAPH_LOOKUP_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub chunk_lines: usize,
    pub cache_capacity: usize,
    pub history_capacity: usize,
    pub debounce_ms: u64,
    pub ignore_dirs: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
            cache_capacity: 100,
            history_capacity: 50,
            debounce_ms: 1500,
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| (*d).to_owned()).collect(),
        }
    }
}

/// Summary of a directory indexing run.
#[derive(Debug, Default, Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub entities_indexed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub ready: bool,
    #[serde(flatten)]
    pub details: Option<StatsDetails>,
}

#[derive(Debug, Serialize)]
pub struct StatsDetails {
    pub entities_indexed: usize,
    pub files_indexed: usize,
    pub cache_size: usize,
    pub query_history_size: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub recent_queries: Vec<QueryRecord>,
}

/// An entity found by name with its neighbourhood in the dependency graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub entity: CodeEntity,
    pub related: Vec<String>,
    pub callers: Vec<String>,
}

pub struct CodeIndex {
    root: PathBuf,
    config: IndexConfig,
    extractor: EntityExtractor,
    embedder: Embedder,
    store: EntityStore,
    memory: MemoryStore,
    graph: Arc<RwLock<DependencyGraph>>,
    /// file key → entities of its current generation
    entity_cache: RwLock<HashMap<String, Vec<CodeEntity>>>,
    retriever: CodeRetriever,
    ready: watch::Sender<bool>,
}

impl std::fmt::Debug for CodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndex")
            .field("root", &self.root)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl CodeIndex {
    /// Build an index over `root`. Nothing is usable until
    /// [`initialize`](Self::initialize) has succeeded.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        config: IndexConfig,
        vectors: Arc<dyn VectorStore>,
        embedder: Embedder,
    ) -> Self {
        let graph = Arc::new(RwLock::new(DependencyGraph::new()));
        let store = EntityStore::new(Arc::clone(&vectors));
        let retriever = CodeRetriever::new(
            embedder.clone(),
            store.clone(),
            Arc::clone(&graph),
            config.cache_capacity,
            config.history_capacity,
        );
        Self {
            root: root.into(),
            extractor: EntityExtractor::new(config.chunk_lines),
            memory: MemoryStore::new(vectors, embedder.clone()),
            config,
            embedder,
            store,
            graph,
            entity_cache: RwLock::new(HashMap::new()),
            retriever,
            ready: watch::Sender::new(false),
        }
    }

    /// Bring the index online: check the embedding backend and create the
    /// entity and memory collections.
    ///
    /// An unreachable embedding backend is not fatal; entities are then
    /// stored with zero vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be created. The index stays
    /// not ready.
    pub async fn initialize(&self) -> Result<()> {
        tracing::info!(root = %self.root.display(), provider = self.embedder.provider_name(), "initializing index");

        match self.embedder.probe().await {
            Ok(dimension) if dimension != self.embedder.dimension() => tracing::warn!(
                expected = self.embedder.dimension(),
                actual = dimension,
                "embedding dimension mismatch, vectors will be zeroed"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!("embedding backend unavailable, using zero vectors: {e}"),
        }

        self.store.ensure_collection(self.embedder.dimension()).await?;
        self.memory.ensure_collection().await?;

        self.ready.send_replace(true);
        tracing::info!("index ready");
        Ok(())
    }

    /// Run [`initialize`](Self::initialize) on a background task.
    pub fn spawn_initialize(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let index = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = index.initialize().await {
                tracing::error!("index initialization failed: {e}");
            }
        })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the index is ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(IndexError::NotReady)
        }
    }

    /// Absolute path on disk and the key entities are stored under: the path
    /// relative to the root when it lies inside it.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> (PathBuf, String) {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        // drops interior `.` components
        let abs: PathBuf = joined.components().collect();
        let key = abs
            .strip_prefix(&self.root)
            .unwrap_or(&abs)
            .to_string_lossy()
            .into_owned();
        (abs, key)
    }

    /// (Re)index one file, replacing its previous generation. Returns the
    /// number of entities stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready, the file cannot be read,
    /// or the new rows cannot be written.
    pub async fn index_file(&self, path: &Path) -> Result<usize> {
        self.ensure_ready()?;
        let (abs, key) = self.resolve(path);

        let bytes = tokio::fs::read(&abs).await?;
        let content = String::from_utf8_lossy(&bytes);
        let mut entities = self.extractor.extract(&key, &content);

        let previous = self
            .entity_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(old) = previous {
            for change in track_evolution(&key, &old, &entities) {
                tracing::info!(file = %key, "{}", change.description);
                if let Err(e) = self.memory.remember(change.to_memory(&key)).await {
                    tracing::warn!(file = %key, "failed to record evolution: {e}");
                }
            }
        }

        if let Err(e) = self.store.delete_file(&key).await {
            tracing::warn!(file = %key, "failed to clear previous rows: {e}");
        }

        for entity in &mut entities {
            entity.vector = Some(self.embedder.embed(&embedding_text(entity)).await);
        }
        let stored = self.store.insert(&entities).await?;

        for entity in &mut entities {
            entity.vector = None;
        }
        {
            let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
            graph.remove_file(&key);
            for entity in &entities {
                graph.add_entity(entity.clone());
            }
        }
        self.entity_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), entities);
        self.retriever.invalidate();

        tracing::info!(file = %key, entities = stored, "indexed file");
        Ok(stored)
    }

    /// Reindex `path`, then every file that imports it, transitively. Each
    /// file is indexed at most once per call. Returns the keys reindexed, in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error only if `path` itself fails; dependents that fail
    /// are logged and skipped.
    pub async fn reindex(&self, path: &Path) -> Result<Vec<String>> {
        self.index_file(path).await?;
        let (_, key) = self.resolve(path);

        let mut visited: HashSet<String> = HashSet::from([key.clone()]);
        let mut done = vec![key.clone()];
        let mut wave = vec![key];
        while !wave.is_empty() {
            let mut next = Vec::new();
            for changed in &wave {
                for dependent in self.dependents_of(Path::new(changed)) {
                    if !visited.insert(dependent.clone()) {
                        continue;
                    }
                    tracing::info!(file = %dependent, changed = %changed, "reindexing dependent");
                    match self.index_file(Path::new(&dependent)).await {
                        Ok(_) => {
                            done.push(dependent.clone());
                            next.push(dependent);
                        }
                        Err(e) => tracing::warn!(file = %dependent, "dependent reindex failed: {e}"),
                    }
                }
            }
            wave = next;
        }
        Ok(done)
    }

    /// Keys of other cached files with an import naming `path`'s stem.
    #[must_use]
    pub fn dependents_of(&self, path: &Path) -> Vec<String> {
        let (_, key) = self.resolve(path);
        let Some(stem) = Path::new(&key).file_stem().and_then(|s| s.to_str()) else {
            return Vec::new();
        };
        let cache = self
            .entity_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut dependents: Vec<String> = cache
            .iter()
            .filter(|(file, _)| **file != key)
            .filter(|(_, entities)| {
                entities
                    .iter()
                    .flat_map(|e| &e.imports)
                    .any(|import| import_refers_to(import, stem))
            })
            .map(|(file, _)| file.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Forget a deleted file. Store failures are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only if the index is not ready.
    pub async fn remove_file(&self, path: &Path) -> Result<()> {
        self.ensure_ready()?;
        let (_, key) = self.resolve(path);
        if let Err(e) = self.store.delete_file(&key).await {
            tracing::debug!(file = %key, "cleanup of removed file failed: {e}");
        }
        self.entity_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_file(&key);
        self.retriever.invalidate();
        tracing::info!(file = %key, "removed file from index");
        Ok(())
    }

    /// Index every supported file under `path` (relative paths resolve
    /// against the root), skipping ignored and hidden directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready. Per-file failures are
    /// collected in the report.
    pub async fn index_directory(&self, path: &Path) -> Result<IndexReport> {
        self.ensure_ready()?;
        let start = std::time::Instant::now();
        let (dir, _) = self.resolve(path);
        let mut report = IndexReport::default();

        let ignore_dirs: HashSet<String> = self.config.ignore_dirs.iter().cloned().collect();
        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(&dir)
            .hidden(true)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry.file_name().to_str().is_some_and(|name| {
                        name.starts_with('.') || ignore_dirs.contains(name)
                    }))
            })
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .collect();
        files.sort();

        let total = files.len();
        tracing::info!(dir = %dir.display(), total, "directory indexing started");
        for file in &files {
            report.files_scanned += 1;
            if !is_indexable(file) {
                continue;
            }
            match self.index_file(file).await {
                Ok(n) => {
                    report.files_indexed += 1;
                    report.entities_indexed += n;
                }
                Err(e) => report.errors.push(format!("{}: {e}", file.display())),
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            files = report.files_indexed,
            entities = report.entities_indexed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "directory indexing finished"
        );
        Ok(report)
    }

    /// Delete every entity whose file path contains `pattern`
    /// (case-insensitive). Returns how many rows matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready or the store fails.
    pub async fn purge(&self, pattern: &str) -> Result<usize> {
        self.ensure_ready()?;
        let matched = self.store.count_matching(pattern).await?;
        if matched == 0 {
            tracing::info!(pattern, "purge: nothing matched");
            return Ok(0);
        }
        self.store.purge_matching(pattern).await?;

        let needle = pattern.to_lowercase();
        let dropped: Vec<String> = {
            let mut cache = self
                .entity_cache
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let keys: Vec<String> = cache
                .keys()
                .filter(|k| k.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            for key in &keys {
                cache.remove(key);
            }
            keys
        };
        {
            let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
            for key in &dropped {
                graph.remove_file(key);
            }
        }
        self.retriever.invalidate();

        tracing::info!(pattern, rows = matched, files = dropped.len(), "purged entities");
        Ok(matched)
    }

    /// # Errors
    ///
    /// Returns an error if the index is not ready.
    pub async fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.ensure_ready()?;
        Ok(self.retriever.query(text, limit).await)
    }

    /// First entity whose name matches `name`, with its related entities
    /// (two hops) and callers.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready.
    pub fn graph_lookup(&self, name: &str) -> Result<Option<GraphView>> {
        self.ensure_ready()?;
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entity) = graph
            .find_by_name(name)
            .first()
            .and_then(|id| graph.node(id))
            .cloned()
        else {
            return Ok(None);
        };
        let related = graph.names(&graph.get_related(&entity.id, GRAPH_LOOKUP_DEPTH));
        let callers = graph.names(&graph.get_callers(&entity.id));
        Ok(Some(GraphView {
            entity,
            related,
            callers,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if the index is not ready or the memory cannot be stored.
    pub async fn remember(&self, content: &str, kind: MemoryKind, context: &str) -> Result<String> {
        self.ensure_ready()?;
        Ok(self
            .memory
            .remember(MemoryRecord::new(content, kind, context))
            .await?)
    }

    /// # Errors
    ///
    /// Returns an error if the index is not ready or the search fails.
    pub async fn recall(&self, query: &str, limit: usize) -> Result<Vec<RecalledMemory>> {
        self.ensure_ready()?;
        Ok(self.memory.recall(query, limit).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the index is not ready or the search fails.
    pub async fn recall_in_context(
        &self,
        query: &str,
        context: &str,
        limit: usize,
    ) -> Result<Vec<RecalledMemory>> {
        self.ensure_ready()?;
        Ok(self.memory.recall_in_context(query, context, limit).await?)
    }

    pub async fn stats(&self) -> IndexStats {
        if !self.is_ready() {
            return IndexStats {
                ready: false,
                details: None,
            };
        }

        let (files_indexed, cached_entities) = {
            let cache = self
                .entity_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            (cache.len(), cache.values().map(Vec::len).sum())
        };
        let entities_indexed = match self.store.count().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("entity count failed: {e}");
                cached_entities
            }
        };
        let (graph_nodes, graph_edges) = {
            let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
            (graph.node_count(), graph.edge_count())
        };

        IndexStats {
            ready: true,
            details: Some(StatsDetails {
                entities_indexed,
                files_indexed,
                cache_size: self.retriever.cache_len(),
                query_history_size: self.retriever.history_len(),
                graph_nodes,
                graph_edges,
                recent_queries: self.retriever.recent(RECENT_QUERIES),
            }),
        }
    }

    /// Every distinct entity name in the current generation, sorted.
    #[must_use]
    pub fn known_entity_names(&self) -> Vec<String> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        graph
            .entity_names()
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Entities of the current generation for `path`.
    #[must_use]
    pub fn cached_entities(&self, path: &Path) -> Option<Vec<CodeEntity>> {
        let (_, key) = self.resolve(path);
        self.entity_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    #[must_use]
    pub fn retriever(&self) -> &CodeRetriever {
        &self.retriever
    }
}
