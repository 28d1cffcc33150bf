//! Knowledge store abstraction.
//!
//! The [`KnowledgeStore`] trait covers the three read paths the retrieval
//! pipeline needs from a vector database: dense ANN search, sparse
//! keyword-weight search, and plain filtered queries. Backends are
//! pluggable (Milvus over REST, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::filter::FilterExpr;
use crate::models::{
    RetrievedChunk, SparseVector, FIELD_CHUNK, FIELD_CLEANED_CHUNK, FIELD_CONTEXT, FIELD_SOURCE,
};

/// One stored entity: its primary key plus every other field as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl KnowledgeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Remove the named vector fields so raw embeddings never leave the
    /// retrieval layer.
    pub fn strip_vectors(&mut self, vector_fields: &[&str]) {
        for f in vector_fields {
            self.fields.remove(*f);
        }
    }

    /// Convert into a [`RetrievedChunk`], splitting out the well-known
    /// fields and leaving the rest as metadata.
    pub fn into_chunk(mut self) -> RetrievedChunk {
        let text = take_string(&mut self.fields, FIELD_CHUNK).unwrap_or_default();
        let cleaned_text = take_string(&mut self.fields, FIELD_CLEANED_CHUNK);
        let source = take_string(&mut self.fields, FIELD_SOURCE).unwrap_or_default();
        let context = match self.fields.remove(FIELD_CONTEXT) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        };
        RetrievedChunk {
            id: self.id,
            source,
            text,
            cleaned_text,
            context,
            metadata: self.fields,
            score: None,
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A record with the raw similarity score its search assigned.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: KnowledgeRecord,
    pub score: f64,
}

/// Abstract vector database backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`dense_search`](KnowledgeStore::dense_search) | Nearest neighbours over the dense vector field |
/// | [`sparse_search`](KnowledgeStore::sparse_search) | Inner-product search over the sparse vector field |
/// | [`query`](KnowledgeStore::query) | Filtered scan without vector ranking |
///
/// Search results are ordered by descending score. `output_fields` of
/// `["*"]` means every stored field.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Names of the stored vector fields (dense, sparse).
    fn vector_fields(&self) -> [&str; 2];

    async fn dense_search(
        &self,
        vector: &[f32],
        filter: Option<&FilterExpr>,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<ScoredRecord>>;

    async fn sparse_search(
        &self,
        vector: &SparseVector,
        filter: Option<&FilterExpr>,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<ScoredRecord>>;

    async fn query(
        &self,
        filter: &FilterExpr,
        limit: usize,
        output_fields: &[String],
    ) -> Result<Vec<KnowledgeRecord>>;
}

/// Keep only the requested fields of a record (`"*"` keeps all).
pub fn project_fields(fields: &Map<String, Value>, output_fields: &[String]) -> Map<String, Value> {
    if output_fields.is_empty() || output_fields.iter().any(|f| f == "*") {
        return fields.clone();
    }
    fields
        .iter()
        .filter(|(k, _)| output_fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_chunk_splits_known_fields() {
        let rec = KnowledgeRecord::new("42")
            .with_field(FIELD_CHUNK, json!("<p>选课</p>"))
            .with_field(FIELD_CLEANED_CHUNK, json!("选课"))
            .with_field(FIELD_SOURCE, json!("manual"))
            .with_field(FIELD_CONTEXT, json!(["本科生手册", "第二章"]))
            .with_field("year", json!(2024));
        let chunk = rec.into_chunk();
        assert_eq!(chunk.id, "42");
        assert_eq!(chunk.source, "manual");
        assert_eq!(chunk.text, "<p>选课</p>");
        assert_eq!(chunk.cleaned_text.as_deref(), Some("选课"));
        assert_eq!(chunk.context, vec!["本科生手册", "第二章"]);
        assert_eq!(chunk.metadata.get("year"), Some(&json!(2024)));
        assert_eq!(chunk.metadata.len(), 1);
    }

    #[test]
    fn test_strip_vectors() {
        let mut rec = KnowledgeRecord::new("1")
            .with_field("dense", json!([0.1, 0.2]))
            .with_field("sparse", json!({"1": 0.5}))
            .with_field(FIELD_CHUNK, json!("x"));
        rec.strip_vectors(&["dense", "sparse"]);
        assert_eq!(rec.fields.len(), 1);
        assert!(rec.fields.contains_key(FIELD_CHUNK));
    }

    #[test]
    fn test_project_fields() {
        let mut m = Map::new();
        m.insert("a".into(), json!(1));
        m.insert("b".into(), json!(2));
        assert_eq!(project_fields(&m, &["*".to_string()]).len(), 2);
        let p = project_fields(&m, &["b".to_string()]);
        assert_eq!(p.len(), 1);
        assert!(p.contains_key("b"));
    }
}
