//! Shared fakes for the integration suite: a recording downstream
//! connection, a deterministic in-process embedder, and an in-memory
//! embedding store ranked with the crate's cosine helper.

#![allow(dead_code)]

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::model::{CallToolRequestParam, CallToolResult, Content, RawContent, Tool};
use toolgate::{
    cosine_similarity, BoundTool, EmbeddingBackend, EmbeddingRow, EmbeddingStore, ProxyError,
    ProxyResult, RequestedEmbedding, SimilarTool, ToolConnection,
};
use uuid::Uuid;

pub fn result_text(result: &CallToolResult) -> String {
    if let RawContent::Text(t) = &result.content[0].raw {
        t.text.clone()
    } else {
        panic!("expected text content");
    }
}

pub fn parse_descriptors(result: &CallToolResult) -> Vec<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(&result_text(result)).unwrap();
    parsed.as_array().expect("expected a JSON array").clone()
}

fn schema_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

pub fn test_tool(name: &str, description: &str) -> Tool {
    test_tool_with_schema(
        name,
        description,
        serde_json::json!({"type": "object", "properties": {}}),
    )
}

pub fn test_tool_with_schema(name: &str, description: &str, schema: serde_json::Value) -> Tool {
    Tool {
        name: Cow::Owned(name.to_string()),
        title: None,
        description: Some(Cow::Owned(description.to_string())),
        input_schema: Arc::new(schema_object(schema)),
        output_schema: None,
        annotations: None,
        icons: None,
    }
}

pub fn bound_tool(
    server: &str,
    name: &str,
    description: &str,
    connection: Arc<RecordingConnection>,
    tool_uuid: Uuid,
) -> BoundTool {
    BoundTool::new(
        server,
        name,
        test_tool(name, description),
        connection,
        tool_uuid,
    )
}

/// Downstream connection that records every call it receives.
pub struct RecordingConnection {
    label: String,
    calls: Mutex<Vec<CallToolRequestParam>>,
}

impl RecordingConnection {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call_name(&self) -> Option<String> {
        self.calls.lock().last().map(|c| c.name.to_string())
    }
}

#[async_trait]
impl ToolConnection for RecordingConnection {
    async fn call_tool(&self, request: CallToolRequestParam) -> ProxyResult<CallToolResult> {
        self.calls.lock().push(request);
        Ok(CallToolResult::success(vec![Content::text(format!(
            "handled by {}",
            self.label
        ))]))
    }
}

/// Deterministic in-process embedder: token-hash bag vectors, so texts
/// sharing words land near each other in cosine space.
pub struct StubEmbedder {
    fail: AtomicBool,
    requests: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn embed_text(text: &str) -> Vec<f32> {
        const DIMS: usize = 16;
        let mut vector = vec![0.0f32; DIMS];
        for token in text.to_lowercase().split_whitespace() {
            let hash = token
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            vector[(hash as usize) % DIMS] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for StubEmbedder {
    async fn generate_embeddings(&self, texts: &[String]) -> ProxyResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProxyError::EmbeddingApi {
                status: 500,
                body: "stub offline".to_string(),
            });
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        "BAAI/bge-m3"
    }

    fn model_dimensions(&self) -> usize {
        16
    }
}

/// In-memory embedding store with cosine ranking.
pub struct MemoryStore {
    rows: Mutex<HashMap<(Uuid, Uuid, String), EmbeddingRow>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(HashMap::new()),
        })
    }

    pub fn rows_for_namespace(&self, namespace_uuid: Uuid) -> Vec<EmbeddingRow> {
        self.rows
            .lock()
            .values()
            .filter(|row| row.namespace_uuid == namespace_uuid)
            .cloned()
            .collect()
    }

    pub fn row_for_tool(&self, tool_uuid: Uuid, namespace_uuid: Uuid) -> Option<EmbeddingRow> {
        self.rows
            .lock()
            .values()
            .find(|row| row.tool_uuid == tool_uuid && row.namespace_uuid == namespace_uuid)
            .cloned()
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn upsert(&self, rows: &[EmbeddingRow]) -> ProxyResult<()> {
        let mut guard = self.rows.lock();
        for row in rows {
            guard.insert(
                (row.tool_uuid, row.namespace_uuid, row.model_name.clone()),
                row.clone(),
            );
        }
        Ok(())
    }

    async fn find_similar(
        &self,
        namespace_uuid: Uuid,
        model_name: &str,
        query: &[f32],
        limit: usize,
    ) -> ProxyResult<Vec<SimilarTool>> {
        let mut hits: Vec<SimilarTool> = self
            .rows
            .lock()
            .values()
            .filter(|row| row.namespace_uuid == namespace_uuid && row.model_name == model_name)
            .map(|row| SimilarTool {
                tool_uuid: row.tool_uuid,
                embedding_text: row.embedding_text.clone(),
                similarity: cosine_similarity(&row.embedding, query),
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn tools_needing_embeddings(
        &self,
        requested: &[RequestedEmbedding],
        namespace_uuid: Uuid,
        model_name: &str,
    ) -> ProxyResult<Vec<Uuid>> {
        let guard = self.rows.lock();
        Ok(requested
            .iter()
            .filter(|r| {
                guard
                    .get(&(r.tool_uuid, namespace_uuid, model_name.to_string()))
                    .map(|row| row.embedding_text != r.embedding_text)
                    .unwrap_or(true)
            })
            .map(|r| r.tool_uuid)
            .collect())
    }

    async fn delete_by_tool_uuids(&self, tool_uuids: &[Uuid]) -> ProxyResult<u64> {
        let mut guard = self.rows.lock();
        let before = guard.len();
        guard.retain(|(tool_uuid, _, _), _| !tool_uuids.contains(tool_uuid));
        Ok((before - guard.len()) as u64)
    }

    async fn delete_by_namespace(
        &self,
        namespace_uuid: Uuid,
        model_name: Option<&str>,
    ) -> ProxyResult<u64> {
        let mut guard = self.rows.lock();
        let before = guard.len();
        guard.retain(|(_, namespace, model), _| {
            *namespace != namespace_uuid || model_name.is_some_and(|m| m != model)
        });
        Ok((before - guard.len()) as u64)
    }

    async fn delete_by_tool_and_namespace(
        &self,
        tool_uuid: Uuid,
        namespace_uuid: Uuid,
    ) -> ProxyResult<u64> {
        let mut guard = self.rows.lock();
        let before = guard.len();
        guard.retain(|(tool, namespace, _), _| *tool != tool_uuid || *namespace != namespace_uuid);
        Ok((before - guard.len()) as u64)
    }

    async fn count_by_namespace(&self, namespace_uuid: Uuid) -> ProxyResult<i64> {
        Ok(self.rows_for_namespace(namespace_uuid).len() as i64)
    }

    async fn has_embeddings(&self, namespace_uuid: Uuid) -> ProxyResult<bool> {
        Ok(!self.rows_for_namespace(namespace_uuid).is_empty())
    }
}
