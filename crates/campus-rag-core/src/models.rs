//! Core data models used throughout Campus RAG.
//!
//! These types describe what flows through the query pipeline: the
//! incoming question, retrieved knowledge chunks, per-call search
//! configuration, and the conversation history the pipeline reads from
//! and appends to.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::FilterExpr;

/// Stored field holding the raw chunk text.
pub const FIELD_CHUNK: &str = "chunk";
/// Stored field holding the chunk text with markup removed.
pub const FIELD_CLEANED_CHUNK: &str = "cleaned_chunk";
/// Stored field holding the domain tag used for routing and filtering.
pub const FIELD_SOURCE: &str = "source";
/// Stored field holding the heading/breadcrumb annotations of a chunk.
pub const FIELD_CONTEXT: &str = "context";

/// A user question accepted for answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub conversation_id: String,
    pub user_id: String,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One persisted turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Full transcript of the run that produced an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metainfo: Option<String>,
    pub create_time: DateTime<Utc>,
}

/// A conversation owned by one user, with its messages oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

/// Lightweight conversation listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub conversation_id: String,
    pub title: Option<String>,
}

impl From<&Conversation> for ConversationView {
    fn from(c: &Conversation) -> Self {
        Self {
            conversation_id: c.conversation_id.clone(),
            title: c.title.clone(),
        }
    }
}

/// Sparse keyword-weight vector (parallel index/value arrays).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Build from `(index, weight)` pairs. Pairs are sorted by index.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|(i, _)| *i);
        let (indices, values) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Inner product with another sparse vector.
    ///
    /// Entries past the shorter of `indices` and `values` are ignored.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut sum = 0.0f32;
        for (idx, a) in self.indices.iter().zip(&self.values) {
            let matching = other
                .indices
                .iter()
                .zip(&other.values)
                .find(|(o, _)| *o == idx);
            if let Some((_, b)) = matching {
                sum += a * b;
            }
        }
        sum
    }
}

/// A knowledge chunk returned by hybrid retrieval.
///
/// Produced by the retriever with raw vectors already stripped; the
/// reranker attaches [`score`](RetrievedChunk::score).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    /// Domain tag (e.g. `"course"`, `"manual"`).
    pub source: String,
    pub text: String,
    pub cleaned_text: Option<String>,
    /// Heading / breadcrumb annotations describing where the chunk came from.
    pub context: Vec<String>,
    /// Remaining stored fields, minus vectors and the fields above.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RetrievedChunk {
    /// Text a reranker scores against the query:
    /// `source + context + " " + (cleaned text or raw text)`.
    pub fn rerank_key(&self) -> String {
        let body = match &self.cleaned_text {
            Some(c) if !c.is_empty() => c.as_str(),
            _ => self.text.as_str(),
        };
        format!("{}{} {}", self.source, self.context.join(" "), body)
    }
}

/// Parameters of a single hybrid retrieval call.
///
/// Weights need not sum to one, but both must be non-negative and at
/// least one must be positive.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub dense_weight: f64,
    pub sparse_weight: f64,
    pub limit: usize,
    pub offset: usize,
    pub filter: Option<FilterExpr>,
    pub output_fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.6,
            sparse_weight: 0.4,
            limit: 50,
            offset: 0,
            filter: None,
            output_fields: vec!["*".to_string()],
        }
    }
}

impl SearchConfig {
    pub fn with_weights(mut self, dense: f64, sparse: f64) -> Self {
        self.dense_weight = dense;
        self.sparse_weight = sparse;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: Option<FilterExpr>) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dense_weight >= 0.0 && self.sparse_weight >= 0.0) {
            bail!("search weights must be >= 0");
        }
        if self.dense_weight == 0.0 && self.sparse_weight == 0.0 {
            bail!("dense_weight and sparse_weight must not both be 0");
        }
        if self.limit == 0 {
            bail!("search limit must be >= 1");
        }
        Ok(())
    }
}
