//! Weighted score fusion of dense and sparse result lists.
//!
//! # Algorithm
//!
//! 1. Min-max normalize each list's raw scores to `[0, 1]`.
//! 2. Merge by record id: `score = w_dense × dense + w_sparse × sparse`,
//!    where a record absent from one list contributes `0.0` for it.
//! 3. Sort by fused score (desc), then id (asc) so ties are stable.
//!
//! Weights are used as given; they are not rescaled to sum to one.

use std::collections::HashMap;

use crate::store::{KnowledgeRecord, ScoredRecord};

/// A record after fusion, carrying the per-list normalized scores.
#[derive(Debug, Clone)]
pub struct FusedRecord {
    pub record: KnowledgeRecord,
    pub score: f64,
    pub dense_score: f64,
    pub sparse_score: f64,
}

/// Min-max normalize raw scores to `[0.0, 1.0]`, in input order.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(hits: &[ScoredRecord]) -> Vec<f64> {
    if hits.is_empty() {
        return Vec::new();
    }

    let s_min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let s_max = hits
        .iter()
        .map(|h| h.score)
        .fold(f64::NEG_INFINITY, f64::max);

    hits.iter()
        .map(|h| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (h.score - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

/// Fuse dense and sparse hits into one list sorted by weighted score.
pub fn fuse_weighted(
    dense: Vec<ScoredRecord>,
    sparse: Vec<ScoredRecord>,
    dense_weight: f64,
    sparse_weight: f64,
) -> Vec<FusedRecord> {
    let norm_dense = normalize_scores(&dense);
    let norm_sparse = normalize_scores(&sparse);

    let mut by_id: HashMap<String, FusedRecord> = HashMap::new();

    for (hit, norm) in dense.into_iter().zip(norm_dense) {
        by_id
            .entry(hit.record.id.clone())
            .or_insert_with(|| FusedRecord {
                record: hit.record,
                score: 0.0,
                dense_score: 0.0,
                sparse_score: 0.0,
            })
            .dense_score = norm;
    }
    for (hit, norm) in sparse.into_iter().zip(norm_sparse) {
        by_id
            .entry(hit.record.id.clone())
            .or_insert_with(|| FusedRecord {
                record: hit.record,
                score: 0.0,
                dense_score: 0.0,
                sparse_score: 0.0,
            })
            .sparse_score = norm;
    }

    let mut fused: Vec<FusedRecord> = by_id
        .into_values()
        .map(|mut f| {
            f.score = dense_weight * f.dense_score + sparse_weight * f.sparse_score;
            f
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    fused
}
