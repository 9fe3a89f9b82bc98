//! Smart tool-discovery proxy for MCP gateways.
//!
//! A gateway aggregates the tool catalogues of many downstream MCP
//! servers into one namespace. This crate collapses that catalogue into
//! a two-operation surface: `discover` searches the bound tools with
//! natural-language queries (lexical fuzzy search, or vector similarity
//! over persisted pgvector embeddings), `execute` forwards a call to
//! the downstream connection that owns the chosen tool.
//!
//! ## Modules
//!
//! - [`proxy`]: the orchestrator owning a namespace binding
//! - [`catalog`]: bound tool table types and the connection handle trait
//! - [`search`]: lexical index and result-list shaping
//! - [`embedding`]: embedding client, canonical text, pgvector store
//!
//! Collaborators (embedding client, vector store, downstream
//! connections) are injected; the crate holds no process-wide state.

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod search;

pub use catalog::{parameter_descriptions, BoundTool, ToolConnection, ToolDescriptor, ToolKey};
pub use config::{
    DynamicLimitConfig, EmbeddingConfig, ProxyConfig, SearchMode, TruncationConfig,
};
pub use embedding::{
    canonical_embedding_text, cosine_similarity, truncate_description, EmbeddingBackend,
    EmbeddingClient, EmbeddingRow, EmbeddingStore, PgEmbeddingRepository, RequestedEmbedding,
    SimilarTool, MAX_EMBEDDING_BATCH,
};
pub use error::{ProxyError, ProxyResult};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use proxy::{SmartProxy, DISCOVER_TOOL_NAME, EXECUTE_TOOL_NAME};
pub use search::{apply_dynamic_limit, LexicalEntry, LexicalIndex, SearchBackend};
