//! Proxy error types.
//!
//! Defines error variants for catalogue lookup, embedding generation,
//! vector persistence, and downstream dispatch.

use thiserror::Error;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Embedding batch too large: {got} texts (limit {limit})")]
    BatchTooLarge { got: usize, limit: usize },

    #[error("Embedding API error (status {status}): {body}")]
    EmbeddingApi { status: u16, body: String },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Downstream call failed: {0}")]
    DownstreamCall(String),

    #[error("Search index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for ProxyError {
    fn from(e: sqlx::Error) -> Self {
        ProxyError::VectorStore(e.to_string())
    }
}

impl From<tantivy::TantivyError> for ProxyError {
    fn from(e: tantivy::TantivyError) -> Self {
        ProxyError::Index(e.to_string())
    }
}
