//! In-memory [`KnowledgeStore`] implementation for testing.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Dense search
//! is brute-force cosine similarity; sparse search is a brute-force inner
//! product. Filters are evaluated with [`FilterExpr::matches`].

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::filter::FilterExpr;
use crate::models::SparseVector;

use super::{project_fields, KnowledgeRecord, KnowledgeStore, ScoredRecord};

const DENSE_FIELD: &str = "dense";
const SPARSE_FIELD: &str = "sparse";

struct StoredEntity {
    record: KnowledgeRecord,
    dense: Vec<f32>,
    sparse: SparseVector,
}

/// In-memory knowledge store.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    entities: RwLock<Vec<StoredEntity>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity by id.
    pub fn insert(&self, record: KnowledgeRecord, dense: Vec<f32>, sparse: SparseVector) -> Result<()> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| anyhow!("knowledge store lock poisoned"))?;
        entities.retain(|e| e.record.id != record.id);
        entities.push(StoredEntity {
            record,
            dense,
            sparse,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search_by<F>(
        &self,
        score: F,
        filter: Option<&FilterExpr>,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<ScoredRecord>>
    where
        F: Fn(&StoredEntity) -> f64,
    {
        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow!("knowledge store lock poisoned"))?;

        let mut hits: Vec<ScoredRecord> = entities
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.record.fields)))
            .map(|e| ScoredRecord {
                record: KnowledgeRecord {
                    id: e.record.id.clone(),
                    fields: project_fields(&e.record.fields, output_fields),
                },
                score: score(e),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn vector_fields(&self) -> [&str; 2] {
        [DENSE_FIELD, SPARSE_FIELD]
    }

    async fn dense_search(
        &self,
        vector: &[f32],
        filter: Option<&FilterExpr>,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<ScoredRecord>> {
        self.search_by(
            |e| cosine_similarity(vector, &e.dense) as f64,
            filter,
            limit,
            output_fields,
        )
    }

    async fn sparse_search(
        &self,
        vector: &SparseVector,
        filter: Option<&FilterExpr>,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<ScoredRecord>> {
        self.search_by(
            |e| vector.dot(&e.sparse) as f64,
            filter,
            limit,
            output_fields,
        )
    }

    async fn query(
        &self,
        filter: &FilterExpr,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<KnowledgeRecord>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow!("knowledge store lock poisoned"))?;
        Ok(entities
            .iter()
            .filter(|e| filter.matches(&e.record.fields))
            .take(limit)
            .map(|e| KnowledgeRecord {
                id: e.record.id.clone(),
                fields: project_fields(&e.record.fields, output_fields),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FIELD_CHUNK, FIELD_SOURCE};
    use serde_json::json;

    fn seeded() -> InMemoryKnowledgeStore {
        let store = InMemoryKnowledgeStore::new();
        let rows = [
            ("c1", "course", vec![1.0, 0.0], vec![(1, 1.0)]),
            ("c2", "course", vec![0.7, 0.7], vec![(2, 2.0)]),
            ("m1", "manual", vec![0.0, 1.0], vec![(1, 0.5), (2, 0.5)]),
        ];
        for (id, source, dense, sparse) in rows {
            store
                .insert(
                    KnowledgeRecord::new(id)
                        .with_field(FIELD_SOURCE, json!(source))
                        .with_field(FIELD_CHUNK, json!(format!("text {id}"))),
                    dense,
                    SparseVector::from_pairs(sparse),
                )
                .unwrap();
        }
        store
    }

    fn all() -> Vec<String> {
        vec!["*".to_string()]
    }

    #[tokio::test]
    async fn test_dense_search_orders_by_cosine() {
        let store = seeded();
        let hits = store.dense_search(&[1.0, 0.0], None, 10, &all()).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "m1"]);
    }

    #[tokio::test]
    async fn test_sparse_search_with_filter_and_limit() {
        let store = seeded();
        let q = SparseVector::from_pairs(vec![(2, 1.0)]);
        let filter = FilterExpr::eq(FIELD_SOURCE, "course");
        let hits = store
            .sparse_search(&q, Some(&filter), 1, &all())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "c2");
    }

    #[tokio::test]
    async fn test_query_projects_fields() {
        let store = seeded();
        let rows = store
            .query(
                &FilterExpr::eq(FIELD_SOURCE, "manual"),
                10,
                &[FIELD_CHUNK.to_string()],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields.len(), 1);
        assert_eq!(rows[0].fields[FIELD_CHUNK], json!("text m1"));
    }

    #[test]
    fn test_insert_replaces_by_id() {
        let store = seeded();
        store
            .insert(KnowledgeRecord::new("c1"), vec![0.0, 0.0], SparseVector::default())
            .unwrap();
        assert_eq!(store.len(), 3);
    }
}
