//! Embedding service client.
//!
//! Thin adapter over an OpenAI-compatible `/embeddings` endpoint with
//! bearer authentication. Callers are responsible for chunking batches;
//! the client enforces the per-request ceiling and fails fast when it
//! is exceeded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{
    config::EmbeddingConfig,
    error::{ProxyError, ProxyResult},
};

/// Per-request input ceiling enforced by the client.
pub const MAX_EMBEDDING_BATCH: usize = 100;

/// A source of embedding vectors.
///
/// Injected into the proxy so reconciliation and query embedding can be
/// exercised without a live service.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts. Empty input returns empty output; more
    /// than [`MAX_EMBEDDING_BATCH`] texts is a caller bug.
    async fn generate_embeddings(&self, texts: &[String]) -> ProxyResult<Vec<Vec<f32>>>;

    /// Convenience over the batch form.
    async fn generate_single_embedding(&self, text: &str) -> ProxyResult<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.generate_embeddings(&texts).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(ProxyError::EmbeddingApi {
                status: 200,
                body: "expected exactly one embedding in response".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str;

    /// Advisory dimension for the configured model. The authoritative
    /// dimension is always the length of a returned vector.
    fn model_dimensions(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// HTTP client for an OpenAI-shaped embedding service.
pub struct EmbeddingClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> ProxyResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProxyError::Config(
                "embedding.apiKey must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: embeddings_url(&config.api_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for EmbeddingClient {
    async fn generate_embeddings(&self, texts: &[String]) -> ProxyResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > MAX_EMBEDDING_BATCH {
            return Err(ProxyError::BatchTooLarge {
                got: texts.len(),
                limit: MAX_EMBEDDING_BATCH,
            });
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::EmbeddingApi {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "embedding request complete"
            );
        }

        extract_vectors(parsed.data, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn model_dimensions(&self) -> usize {
        model_dimensions(&self.model)
    }
}

fn embeddings_url(base: &str) -> String {
    format!("{}/embeddings", base.trim_end_matches('/'))
}

/// Sort response rows by their `index` field and unwrap the vectors.
/// The service is not required to preserve input order.
fn extract_vectors(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> ProxyResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(ProxyError::EmbeddingApi {
            status: 200,
            body: format!(
                "response contained {} embeddings for {} inputs",
                data.len(),
                expected
            ),
        });
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Advisory dimension table; unknown models default to 1024.
pub fn model_dimensions(model: &str) -> usize {
    match model {
        "BAAI/bge-m3" => 1024,
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => 1024,
    }
}

/// Cosine similarity between two vectors.
///
/// Zero when either vector has zero norm or lengths differ. Exposed for
/// in-process fallback ranking; the vector store computes distance
/// server-side on the hot path.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
