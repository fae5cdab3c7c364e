use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::vector_store::{
    FieldValue, PayloadRecord, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Default)]
struct InMemoryCollection {
    points: HashMap<String, StoredPoint>,
}

/// Process-local vector store: brute-force cosine search over a locked map.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    for cond in &filter.must {
        let Some(val) = payload.get(&cond.field) else {
            return false;
        };
        if !field_matches(val, &cond.value) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if let Some(val) = payload.get(&cond.field)
            && field_matches(val, &cond.value)
        {
            return false;
        }
    }
    true
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
        FieldValue::Contains(needle) => val
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        _vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_default();
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            // Ties broken by id so equal-score results come back in a stable order.
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Delete(format!("collection {collection} not found"))
            })?;
            let before = col.points.len();
            col.points.retain(|_, sp| !matches_filter(&sp.payload, &filter));
            Ok(before - col.points.len())
        })
    }

    fn scroll(
        &self,
        collection: &str,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<PayloadRecord>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Scroll(format!("collection {collection} not found"))
            })?;

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);
            let mut records: Vec<PayloadRecord> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .map(|(id, sp)| PayloadRecord {
                    id: id.clone(),
                    payload: sp.payload.clone(),
                })
                .collect();
            records.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, path: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("file_path".into(), serde_json::json!(path))]),
        }
    }

    async fn seeded() -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("a", vec![1.0, 0.0], "/repo/src/Cache.rs"),
                    point("b", vec![0.0, 1.0], "/repo/src/graph.rs"),
                    point("c", vec![0.7, 0.7], "/repo/vendor/lib.rs"),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = seeded().await;
        let hits = store.search("c", vec![1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_respects_limit_and_filter() {
        let store = seeded().await;
        let filter = VectorFilter::must("file_path", FieldValue::Text("/repo/src/graph.rs".into()));
        let hits = store
            .search("c", vec![1.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");

        let hits = store.search("c", vec![1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn contains_filter_is_case_insensitive() {
        let store = seeded().await;
        let filter = VectorFilter::must("file_path", FieldValue::Contains("cache".into()));
        let rows = store.scroll("c", Some(filter)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[tokio::test]
    async fn must_not_excludes() {
        let store = seeded().await;
        let filter = VectorFilter {
            must: vec![],
            must_not: vec![crate::vector_store::FieldCondition {
                field: "file_path".into(),
                value: FieldValue::Contains("vendor".into()),
            }],
        };
        let rows = store.scroll("c", Some(filter)).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn delete_by_filter_reports_count() {
        let store = seeded().await;
        let removed = store
            .delete_by_filter("c", VectorFilter::must("file_path", FieldValue::Contains("/SRC/".into())))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.scroll("c", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_id() {
        let store = seeded().await;
        store
            .upsert("c", vec![point("b", vec![1.0, 0.0], "/repo/src/graph.rs")])
            .await
            .unwrap();
        let rows = store.scroll("c", None).await.unwrap();
        assert_eq!(rows.len(), 3);
        let hits = store.search("c", vec![1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[tokio::test]
    async fn missing_collection_errors() {
        let store = InMemoryVectorStore::new();
        assert!(store.search("nope", vec![1.0], 1, None).await.is_err());
        assert!(store.upsert("nope", vec![]).await.is_err());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    proptest::proptest! {
        #[test]
        fn cosine_is_symmetric_and_bounded(
            pairs in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 1..16)
        ) {
            let (a, b): (Vec<f32>, Vec<f32>) = pairs.into_iter().unzip();
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            proptest::prop_assert!((ab - ba).abs() < 1e-5);
            proptest::prop_assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&ab));
        }
    }
}
