//! Per-namespace proxy configuration.
//!
//! Recognized keys (camelCase on the wire) cover the search mode, the
//! lexical fuzziness and field boost, the dynamic result limit, the
//! embedding service, and description truncation. Configuration arrives
//! either as a YAML file or as a JSON value handed over by the admin
//! layer.

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, ProxyResult};

/// Which search backend a namespace prefers for `discover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Embeddings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Search backend selection. `embeddings` additionally requires an
    /// embedding client and a vector store to be injected.
    #[serde(default)]
    pub search_mode: SearchMode,

    /// Fuzzy edit-distance knob in `[0,1]` for the lexical backend.
    #[serde(default = "default_fuzzy")]
    pub fuzzy: f32,

    /// Score boost applied to matches on the description field.
    #[serde(default = "default_description_boost")]
    pub description_boost: f32,

    /// Operator override for the advertised `discover` tool description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_description: Option<String>,

    /// Deprecated upper bound on `discover` results. Parsed for
    /// compatibility; `dynamic_limit.max_results` governs both backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_limit: Option<usize>,

    #[serde(default)]
    pub dynamic_limit: DynamicLimitConfig,

    /// Embedding service settings. Absent means the vector path is
    /// unavailable even when `search_mode` is `embeddings`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfig>,

    #[serde(default)]
    pub truncation: TruncationConfig,
}

/// Plateau selection over a descending score list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicLimitConfig {
    /// Hard cap on returned results.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Absolute score floor.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Relative score gap that ends the accepted plateau.
    #[serde(default = "default_drop_threshold")]
    pub drop_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    pub api_key: String,

    /// Base URL of an OpenAI-compatible service; `/embeddings` is
    /// appended.
    pub api_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

/// Description truncation for canonical embedding text.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// 1-based delimiter occurrence at which truncation may begin.
    #[serde(default = "default_occurrence")]
    pub occurrence: usize,

    /// Minimum length of the kept prefix; shorter candidates are
    /// skipped in favor of later occurrences or the full description.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_fuzzy() -> f32 {
    0.2
}

fn default_description_boost() -> f32 {
    2.0
}

fn default_max_results() -> usize {
    10
}

fn default_min_score() -> f32 {
    0.3
}

fn default_drop_threshold() -> f32 {
    0.30
}

fn default_embedding_model() -> String {
    "BAAI/bge-m3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_occurrence() -> usize {
    1
}

fn default_min_length() -> usize {
    5
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            search_mode: SearchMode::default(),
            fuzzy: default_fuzzy(),
            description_boost: default_description_boost(),
            discover_description: None,
            discover_limit: None,
            dynamic_limit: DynamicLimitConfig::default(),
            embedding: None,
            truncation: TruncationConfig::default(),
        }
    }
}

impl Default for DynamicLimitConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: default_min_score(),
            drop_threshold: default_drop_threshold(),
        }
    }
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delimiter: default_delimiter(),
            occurrence: default_occurrence(),
            min_length: default_min_length(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file.
    pub async fn from_file(path: &str) -> ProxyResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ProxyError::Config(format!("parse {}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON value (the shape the admin layer
    /// stores per endpoint).
    pub fn from_value(value: serde_json::Value) -> ProxyResult<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ProxyError::Config(format!("parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges. Called by both loaders; cheap enough to call
    /// again on hand-built configs.
    pub fn validate(&self) -> ProxyResult<()> {
        if !(0.0..=1.0).contains(&self.fuzzy) {
            return Err(ProxyError::Config(format!(
                "fuzzy must be in [0,1], got {}",
                self.fuzzy
            )));
        }
        if self.description_boost < 0.0 {
            return Err(ProxyError::Config(format!(
                "descriptionBoost must be >= 0, got {}",
                self.description_boost
            )));
        }
        if self.dynamic_limit.drop_threshold < 0.0 {
            return Err(ProxyError::Config(format!(
                "dynamicLimit.dropThreshold must be >= 0, got {}",
                self.dynamic_limit.drop_threshold
            )));
        }
        if self.truncation.occurrence == 0 {
            return Err(ProxyError::Config(
                "truncation.occurrence must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
