//! Embedding generation and persistence.
//!
//! ## Modules
//!
//! - [`client`]: HTTP adapter for an OpenAI-compatible embedding service
//! - [`repository`]: pgvector-backed row storage and similarity search
//! - [`text`]: canonical embedding text and description truncation

pub mod client;
pub mod repository;
pub mod text;

pub use client::{
    cosine_similarity, model_dimensions, EmbeddingBackend, EmbeddingClient, MAX_EMBEDDING_BATCH,
};
pub use repository::{
    EmbeddingRow, EmbeddingStore, PgEmbeddingRepository, RequestedEmbedding, SimilarTool,
};
pub use text::{canonical_embedding_text, truncate_description};
