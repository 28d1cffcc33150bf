//! Query encoding trait and vector utilities.
//!
//! Defines the [`EmbeddingService`] trait that turns one query string into
//! both a dense vector and a sparse keyword-weight vector, plus pure helper
//! functions for similarity computation.
//!
//! Concrete encoders (remote HTTP, local fastembed models) live in the
//! `campus-rag` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::SparseVector;

/// Dense and sparse representation of one query, produced together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEncoding {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// Trait for query encoders.
///
/// A single call must yield both representations so that the dense and
/// sparse searches of one retrieval always describe the same text.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-m3"`).
    fn model_name(&self) -> &str;

    /// Encode a query into its dense and sparse vectors.
    async fn encode(&self, text: &str) -> Result<QueryEncoding>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_encoding_deserializes_from_wire_shape() {
        let enc: QueryEncoding = serde_json::from_str(
            r#"{"dense":[0.1,0.2],"sparse":{"indices":[4,9],"values":[0.5,1.5]}}"#,
        )
        .unwrap();
        assert_eq!(enc.dense.len(), 2);
        assert_eq!(enc.sparse.indices, vec![4, 9]);
    }
}
