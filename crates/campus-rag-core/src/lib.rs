//! # Campus RAG Core
//!
//! Runtime-free building blocks shared by the Campus RAG service: data
//! models, the typed filter-expression builder, weighted score fusion,
//! and the [`store::KnowledgeStore`] / [`embedding::EmbeddingService`]
//! traits that the retrieval pipeline talks to.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concrete adapters (Milvus, remote encoders, SQLite) live in the
//! `campus-rag` application crate.

pub mod embedding;
pub mod filter;
pub mod fusion;
pub mod models;
pub mod store;
