//! Intent-aware retrieval: vector search, multiplicative re-ranking, graph
//! enrichment, result caching and query history.
//!
//! Scores are distances. Every boost multiplies by a factor below one, so a
//! LOWER score is a BETTER match.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use kenning_memory::Embedder;
use serde::Serialize;

use crate::cache::ResultCache;
use crate::entity::{CodeEntity, EntityKind};
use crate::graph::DependencyGraph;
use crate::intent::{IntentClassifier, IntentKind, QueryIntent};
use crate::store::EntityStore;

const KIND_BOOST: f32 = 0.8;
const DOC_BOOST: f32 = 0.7;
const NAME_BOOST: f32 = 0.6;
const CONCEPT_BOOST: f32 = 0.7;
const MAX_RELATED: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub entity: CodeEntity,
    /// Lower is better.
    pub score: f32,
    pub reason: String,
    pub related: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub text: String,
    pub intent: IntentKind,
    pub timestamp: f64,
    pub result_ids: Vec<String>,
}

/// Apply the intent boosts to a candidate's base distance, returning the
/// adjusted score and the conditions that fired.
#[must_use]
pub fn score_candidate(
    distance: f32,
    entity: &CodeEntity,
    intent: &QueryIntent,
) -> (f32, Vec<String>) {
    let mut score = distance;
    let mut reasons = Vec::new();

    if intent.kind == IntentKind::FindCode
        && matches!(
            entity.kind,
            EntityKind::Function | EntityKind::Class | EntityKind::Method
        )
    {
        score *= KIND_BOOST;
        reasons.push(format!("matches {} '{}'", entity.kind, entity.name));
    }

    if intent.kind == IntentKind::Explain && entity.doc.as_deref().is_some_and(|d| !d.is_empty()) {
        score *= DOC_BOOST;
        reasons.push("has documentation".to_owned());
    }

    let name = entity.name.to_lowercase();
    if intent
        .entities
        .iter()
        .any(|token| name.contains(&token.to_lowercase()))
    {
        score *= NAME_BOOST;
        reasons.push("name matches query".to_owned());
    }

    let content = entity.content.to_lowercase();
    if let Some(concept) = intent.concepts.iter().find(|c| content.contains(c.as_str())) {
        score *= CONCEPT_BOOST;
        reasons.push(format!("contains {concept}"));
    }

    (score, reasons)
}

fn reason_text(reasons: &[String]) -> String {
    if reasons.is_empty() {
        "semantic similarity".to_owned()
    } else {
        reasons.join(", ")
    }
}

pub struct CodeRetriever {
    classifier: IntentClassifier,
    embedder: Embedder,
    store: EntityStore,
    graph: Arc<RwLock<DependencyGraph>>,
    cache: ResultCache<Vec<SearchResult>>,
    history: Mutex<VecDeque<QueryRecord>>,
    history_capacity: usize,
}

impl std::fmt::Debug for CodeRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeRetriever")
            .field("cache", &self.cache)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

impl CodeRetriever {
    #[must_use]
    pub fn new(
        embedder: Embedder,
        store: EntityStore,
        graph: Arc<RwLock<DependencyGraph>>,
        cache_capacity: usize,
        history_capacity: usize,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            embedder,
            store,
            graph,
            cache: ResultCache::new(cache_capacity),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Ranked results for `text`, best first. A failed search yields an
    /// empty list that is not cached.
    pub async fn query(&self, text: &str, limit: usize) -> Vec<SearchResult> {
        let key = ResultCache::<Vec<SearchResult>>::key(text, limit);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(query = text, "result cache hit");
            return hit;
        }

        let intent = self.classifier.recognize(text);
        tracing::debug!(
            query = text,
            intent = %intent.kind,
            entities = ?intent.entities,
            concepts = ?intent.concepts,
            "query intent"
        );

        let vector = self.embedder.embed(text).await;
        let hits = match self.store.search(vector, limit.saturating_mul(2)).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = text, "entity search failed: {e}");
                return Vec::new();
            }
        };

        let mut results: Vec<SearchResult> = {
            let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
            hits.into_iter()
                .map(|hit| {
                    let (score, reasons) = score_candidate(hit.distance, &hit.entity, &intent);
                    let mut related = graph.get_related(&hit.entity.id, 1);
                    related.truncate(MAX_RELATED);
                    SearchResult {
                        related: graph.names(&related),
                        reason: reason_text(&reasons),
                        score,
                        entity: hit.entity,
                    }
                })
                .collect()
        };
        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        results.truncate(limit);

        self.cache.put(key, results.clone());
        self.record(QueryRecord {
            text: text.to_owned(),
            intent: intent.kind,
            timestamp: kenning_memory::unix_timestamp(),
            result_ids: results.iter().map(|r| r.entity.id.clone()).collect(),
        });
        results
    }

    /// The last `n` queries, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<QueryRecord> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().skip(history.len().saturating_sub(n)).cloned().collect()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached result. Called whenever index contents change.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    fn record(&self, entry: QueryRecord) {
        if self.history_capacity == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ContextLabel;
    use kenning_llm::any::AnyProvider;
    use kenning_llm::hashing::HashingProvider;
    use kenning_memory::InMemoryVectorStore;

    fn intent(kind: IntentKind, entities: &[&str], concepts: &[&str]) -> QueryIntent {
        QueryIntent {
            kind,
            entities: entities.iter().map(|s| (*s).to_owned()).collect(),
            concepts: concepts.iter().map(|s| (*s).to_owned()).collect(),
            context: ContextLabel::Implementation,
            specificity: 0.5,
        }
    }

    fn entity(kind: EntityKind, name: &str, content: &str) -> CodeEntity {
        CodeEntity::new(kind, name, "src/lib.rs", 1, 1, content)
    }

    #[test]
    fn no_signal_keeps_distance() {
        let e = entity(EntityKind::Chunk, "chunk_0", "plain text");
        let (score, reasons) = score_candidate(0.4, &e, &intent(IntentKind::Debug, &[], &[]));
        assert!((score - 0.4).abs() < f32::EPSILON);
        assert_eq!(reason_text(&reasons), "semantic similarity");
    }

    #[test]
    fn boosts_compound() {
        let e = entity(EntityKind::Function, "parseConfig", "fn parse_config() { cache }");
        let q = intent(IntentKind::FindCode, &["parseConfig"], &["memory", "cache"]);
        let (score, reasons) = score_candidate(1.0, &e, &q);
        // kind, name and the first concept present in the content ("cache")
        assert!((score - 0.8 * 0.6 * 0.7).abs() < 1e-6);
        assert_eq!(
            reasons,
            vec![
                "matches function 'parseConfig'",
                "name matches query",
                "contains cache"
            ]
        );
    }

    #[test]
    fn explain_boosts_documented_entities() {
        let mut e = entity(EntityKind::Struct, "Index", "");
        e.doc = Some("The index.".into());
        let (score, reasons) = score_candidate(1.0, &e, &intent(IntentKind::Explain, &[], &[]));
        assert!((score - 0.7).abs() < 1e-6);
        assert_eq!(reasons, vec!["has documentation"]);
    }

    #[test]
    fn name_match_ranks_strictly_better_at_equal_distance() {
        let q = intent(IntentKind::Debug, &["Cache"], &[]);
        let matching = entity(EntityKind::Struct, "LruCache", "");
        let other = entity(EntityKind::Struct, "Graph", "");
        let (a, _) = score_candidate(0.5, &matching, &q);
        let (b, _) = score_candidate(0.5, &other, &q);
        assert!(a < b);
    }

    fn retriever(history_capacity: usize) -> CodeRetriever {
        let embedder = Embedder::new(AnyProvider::Hashing(HashingProvider::new(64)), 64);
        let store = EntityStore::new(Arc::new(InMemoryVectorStore::new()));
        CodeRetriever::new(
            embedder,
            store,
            Arc::new(RwLock::new(DependencyGraph::new())),
            8,
            history_capacity,
        )
    }

    #[tokio::test]
    async fn search_failure_yields_empty_uncached() {
        // collection never created, so the store reports an error
        let r = retriever(4);
        assert!(r.query("anything", 3).await.is_empty());
        assert_eq!(r.cache_len(), 0);
        assert_eq!(r.history_len(), 0);
    }

    #[tokio::test]
    async fn history_is_bounded_and_cache_fills() {
        let r = retriever(2);
        r.store.ensure_collection(64).await.unwrap();
        for q in ["one", "two", "three"] {
            r.query(q, 2).await;
        }
        let recent = r.recent(5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "two");
        assert_eq!(recent[1].text, "three");
        assert_eq!(r.cache_len(), 3);
        r.invalidate();
        assert_eq!(r.cache_len(), 0);
    }
}
