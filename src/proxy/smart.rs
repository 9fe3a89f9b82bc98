//! Smart proxy orchestrator.
//!
//! Owns one namespace binding and presents the two-operation surface
//! (`discover`, `execute`) in place of the aggregated catalogue. Routes
//! `discover` to the lexical or vector backend per configuration and
//! keeps persisted embeddings reconciled with the bound descriptors.
//!
//! ## Usage
//!
//! ```ignore
//! let proxy = SmartProxy::new(config)?
//!     .with_vector_search(namespace_uuid, embedder, store);
//!
//! proxy.bind(tools).await?;
//! let hits = proxy.discover(&["version control".into()]).await?;
//! let result = proxy.execute("git", "commit", args).await?;
//! ```

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::RwLock;
use rmcp::model::{CallToolRequestParam, CallToolResult, Content, Tool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{parameter_descriptions, BoundTool, ToolDescriptor, ToolKey},
    config::{ProxyConfig, SearchMode},
    embedding::{
        canonical_embedding_text, EmbeddingBackend, EmbeddingRow, EmbeddingStore,
        RequestedEmbedding,
    },
    error::{ProxyError, ProxyResult},
    metrics::ProxyMetrics,
    search::{apply_dynamic_limit, LexicalEntry, LexicalIndex, SearchBackend},
};

pub const DISCOVER_TOOL_NAME: &str = "discover";
pub const EXECUTE_TOOL_NAME: &str = "execute";

const DEFAULT_DISCOVER_DESCRIPTION: &str = "Search the available tools with one or more \
natural-language queries and return the best matches with their input schemas. Call this \
before 'execute' to find the right toolId and method.";

const EXECUTE_DESCRIPTION: &str = "Execute a tool previously returned by 'discover'. Pass \
toolId and method exactly as discovered, with args matching the tool's input schema.";

/// Embedding texts per reconciliation request; kept below the client's
/// per-request ceiling.
const RECONCILE_BATCH_SIZE: usize = 50;

/// Pause between reconciliation batches, for rate-limited providers.
const RECONCILE_BATCH_PAUSE: Duration = Duration::from_millis(100);

/// One immutable view of the bound catalogue.
///
/// Published as a whole on every bind so readers never observe a
/// half-replaced table.
struct ProxyState {
    tools: HashMap<ToolKey, BoundTool>,
    by_uuid: HashMap<Uuid, ToolKey>,
    lexical: LexicalIndex,
}

impl ProxyState {
    fn empty() -> ProxyResult<Self> {
        Ok(Self {
            tools: HashMap::new(),
            by_uuid: HashMap::new(),
            lexical: LexicalIndex::empty()?,
        })
    }
}

/// Orchestrator for one namespace binding.
///
/// Thread-safe; `bind`/`unbind` are the only writers, `discover` and
/// `execute` read a published snapshot.
pub struct SmartProxy {
    config: ProxyConfig,
    state: RwLock<Arc<ProxyState>>,
    namespace_uuid: Option<Uuid>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    store: Option<Arc<dyn EmbeddingStore>>,
    /// Set when embedding generation or the vector store fails; the
    /// binding then answers from the lexical index for its lifetime.
    lexical_only: AtomicBool,
    metrics: Arc<ProxyMetrics>,
}

impl SmartProxy {
    pub fn new(config: ProxyConfig) -> ProxyResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(Arc::new(ProxyState::empty()?)),
            namespace_uuid: None,
            embedder: None,
            store: None,
            lexical_only: AtomicBool::new(false),
            metrics: Arc::new(ProxyMetrics::new()),
        })
    }

    /// Enable the vector path for this binding. Without all three
    /// collaborators, `embeddings` mode silently behaves as `keyword`.
    #[must_use]
    pub fn with_vector_search(
        mut self,
        namespace_uuid: Uuid,
        embedder: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn EmbeddingStore>,
    ) -> Self {
        self.namespace_uuid = Some(namespace_uuid);
        self.embedder = Some(embedder);
        self.store = Some(store);
        self
    }

    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn tool_count(&self) -> usize {
        self.snapshot().tools.len()
    }

    // ========================================================================
    // Binding lifecycle
    // ========================================================================

    /// Replace the bound catalogue.
    ///
    /// The tool table and lexical index are swapped atomically; in
    /// vector mode, persisted embeddings are then reconciled against
    /// the new canonical texts. Reconciliation failures downgrade the
    /// binding to keyword search instead of failing the bind: the
    /// lexical index is always ready.
    pub async fn bind(&self, tools: Vec<BoundTool>) -> ProxyResult<()> {
        let mut table: HashMap<ToolKey, BoundTool> = HashMap::with_capacity(tools.len());
        let mut by_uuid: HashMap<Uuid, ToolKey> = HashMap::with_capacity(tools.len());
        let mut entries: Vec<LexicalEntry> = Vec::with_capacity(tools.len());

        for tool in tools {
            if table.contains_key(&tool.key) {
                warn!(key = %tool.key, "duplicate tool key in bind batch; keeping the last");
                entries.retain(|e| {
                    !(e.tool_id == tool.key.server_name && e.method == tool.key.original_name)
                });
            }
            entries.push(LexicalEntry {
                tool_id: tool.key.server_name.clone(),
                method: tool.key.original_name.clone(),
                description: tool.description().to_string(),
                parameter_descriptions: parameter_descriptions(&tool.descriptor.input_schema),
            });
            by_uuid.insert(tool.tool_uuid, tool.key.clone());
            table.insert(tool.key.clone(), tool);
        }

        let state = ProxyState {
            lexical: LexicalIndex::build(&entries)?,
            tools: table,
            by_uuid,
        };

        *self.state.write() = Arc::new(state);
        // A fresh catalogue gets a fresh chance at the vector path.
        self.lexical_only.store(false, Ordering::Relaxed);
        info!(tools = entries.len(), "catalogue bound");

        if self.vector_configured() {
            match self.reconcile_embeddings().await {
                Ok(generated) => {
                    self.metrics.record_reconcile(true);
                    if generated > 0 {
                        info!(generated, "embeddings reconciled");
                    }
                }
                Err(e) => {
                    self.metrics.record_reconcile(false);
                    self.lexical_only.store(true, Ordering::Relaxed);
                    warn!(error = %e, "embedding reconciliation failed; using keyword search");
                }
            }
        }

        Ok(())
    }

    /// Drop the bound catalogue.
    pub fn unbind(&self) -> ProxyResult<()> {
        *self.state.write() = Arc::new(ProxyState::empty()?);
        self.lexical_only.store(false, Ordering::Relaxed);
        info!("catalogue unbound");
        Ok(())
    }

    /// Operator action: delete this namespace's persisted embeddings
    /// for the configured model. The next bind regenerates them.
    pub async fn purge_embeddings(&self) -> ProxyResult<u64> {
        let (Some(namespace), Some(store)) = (self.namespace_uuid, self.store.as_ref()) else {
            return Ok(0);
        };
        let model = self.embedder.as_ref().map(|e| e.model_name().to_string());
        store.delete_by_namespace(namespace, model.as_deref()).await
    }

    // ========================================================================
    // Smart surface
    // ========================================================================

    /// The fixed two-tool catalogue advertised while smart mode is
    /// active. The `discover` description is operator-overridable.
    pub fn list_tools(&self) -> Vec<Tool> {
        let discover_description = self
            .config
            .discover_description
            .clone()
            .unwrap_or_else(|| DEFAULT_DISCOVER_DESCRIPTION.to_string());

        vec![
            Tool {
                name: Cow::Borrowed(DISCOVER_TOOL_NAME),
                title: None,
                description: Some(Cow::Owned(discover_description)),
                input_schema: Arc::new(schema_object(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "queries": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Natural-language descriptions of the capability you need."
                        }
                    },
                    "required": ["queries"]
                }))),
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed(EXECUTE_TOOL_NAME),
                title: None,
                description: Some(Cow::Borrowed(EXECUTE_DESCRIPTION)),
                input_schema: Arc::new(schema_object(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "toolId": {
                            "type": "string",
                            "description": "The toolId of a discovered tool."
                        },
                        "method": {
                            "type": "string",
                            "description": "The method of a discovered tool."
                        },
                        "args": {
                            "type": "object",
                            "description": "Arguments matching the tool's input schema."
                        }
                    },
                    "required": ["toolId", "method", "args"]
                }))),
                output_schema: None,
                annotations: None,
                icons: None,
            },
        ]
    }

    /// Search the bound catalogue.
    ///
    /// Vector and keyword results share one wire shape: a text content
    /// item holding a JSON array of `{toolId, method, description,
    /// inputSchema}` descriptors. Embedding or store failures never
    /// fail the call; they downgrade the binding and the lexical index
    /// answers instead.
    pub async fn discover(&self, queries: &[String]) -> ProxyResult<CallToolResult> {
        self.metrics.record_discover();

        let query = queries.join(" ");
        let snapshot = self.snapshot();

        let descriptors = if query.trim().is_empty() {
            Vec::new()
        } else {
            match self.backend() {
                SearchBackend::Vector => {
                    match self.vector_discover(&query, &snapshot).await {
                        Ok(descriptors) => {
                            self.metrics.record_vector_search();
                            descriptors
                        }
                        Err(e) => {
                            warn!(error = %e, "vector discovery failed; falling back to keyword search");
                            self.lexical_only.store(true, Ordering::Relaxed);
                            self.metrics.record_vector_fallback();
                            self.lexical_discover(&query, &snapshot)?
                        }
                    }
                }
                SearchBackend::Lexical => self.lexical_discover(&query, &snapshot)?,
            }
        };

        let text = serde_json::to_string(&descriptors)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Forward a call to the downstream connection owning
    /// `tool_id::method`. The downstream result and its errors pass
    /// through untouched.
    pub async fn execute(
        &self,
        tool_id: &str,
        method: &str,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> ProxyResult<CallToolResult> {
        let snapshot = self.snapshot();
        let key = ToolKey::new(tool_id, method);

        let Some(tool) = snapshot.tools.get(&key) else {
            self.metrics.record_execute(false);
            return Err(ProxyError::ToolNotFound(format!(
                "Tool '{}' is not available on '{}'. Call '{}' first to find the right \
                 toolId and method.",
                method, tool_id, DISCOVER_TOOL_NAME
            )));
        };

        let request = CallToolRequestParam {
            name: Cow::Owned(method.to_string()),
            arguments: Some(args),
        };

        let result = tool.connection.call_tool(request).await;
        self.metrics.record_execute(result.is_ok());
        result
    }

    // ========================================================================
    // Search backends
    // ========================================================================

    fn snapshot(&self) -> Arc<ProxyState> {
        self.state.read().clone()
    }

    fn vector_configured(&self) -> bool {
        self.config.search_mode == SearchMode::Embeddings
            && self.namespace_uuid.is_some()
            && self.embedder.is_some()
            && self.store.is_some()
    }

    fn backend(&self) -> SearchBackend {
        if self.vector_configured() && !self.lexical_only.load(Ordering::Relaxed) {
            SearchBackend::Vector
        } else {
            SearchBackend::Lexical
        }
    }

    fn lexical_discover(
        &self,
        query: &str,
        snapshot: &ProxyState,
    ) -> ProxyResult<Vec<ToolDescriptor>> {
        self.metrics.record_lexical_search();

        // Over-fetch past the cap so the selector has pruning headroom.
        let limit = self.config.dynamic_limit.max_results * 2;
        let hits = snapshot.lexical.search(
            query,
            self.config.fuzzy,
            self.config.description_boost,
            limit,
        )?;

        let scored: Vec<(ToolDescriptor, f32)> = hits
            .into_iter()
            .filter_map(|(key, score)| {
                snapshot
                    .tools
                    .get(&key)
                    .map(|tool| (ToolDescriptor::from_bound(tool), score))
            })
            .collect();

        let selected = apply_dynamic_limit(scored, &self.config.dynamic_limit);
        Ok(selected.into_iter().map(|(d, _)| d).collect())
    }

    async fn vector_discover(
        &self,
        query: &str,
        snapshot: &ProxyState,
    ) -> ProxyResult<Vec<ToolDescriptor>> {
        let (Some(namespace), Some(embedder), Some(store)) = (
            self.namespace_uuid,
            self.embedder.as_ref(),
            self.store.as_ref(),
        ) else {
            return Err(ProxyError::Config(
                "vector search requires a namespace, an embedding client, and a store"
                    .to_string(),
            ));
        };

        let vector = embedder.generate_single_embedding(query).await?;
        let limit = self.config.dynamic_limit.max_results * 2;
        let hits = store
            .find_similar(namespace, embedder.model_name(), &vector, limit)
            .await?;

        let mut scored: Vec<(ToolDescriptor, f32)> = Vec::with_capacity(hits.len());
        for hit in hits {
            match snapshot
                .by_uuid
                .get(&hit.tool_uuid)
                .and_then(|key| snapshot.tools.get(key))
            {
                Some(tool) => scored.push((ToolDescriptor::from_bound(tool), hit.similarity)),
                // The tool was unbound after its embedding was stored; a
                // benign race.
                None => debug!(tool_uuid = %hit.tool_uuid, "similar tool no longer bound; skipping"),
            }
        }

        let selected = apply_dynamic_limit(scored, &self.config.dynamic_limit);
        Ok(selected.into_iter().map(|(d, _)| d).collect())
    }

    // ========================================================================
    // Embedding reconciliation
    // ========================================================================

    /// Regenerate missing or stale embeddings for the bound catalogue.
    ///
    /// Upserts are per-row, so cancellation mid-run leaves a usable
    /// store; the next reconciliation fills the remainder.
    async fn reconcile_embeddings(&self) -> ProxyResult<u64> {
        let (Some(namespace), Some(embedder), Some(store)) = (
            self.namespace_uuid,
            self.embedder.as_ref(),
            self.store.as_ref(),
        ) else {
            return Ok(0);
        };

        let snapshot = self.snapshot();
        let requested: Vec<RequestedEmbedding> = snapshot
            .tools
            .values()
            .map(|tool| RequestedEmbedding {
                tool_uuid: tool.tool_uuid,
                embedding_text: canonical_embedding_text(
                    tool.original_name(),
                    tool.descriptor.description.as_deref(),
                    &parameter_descriptions(&tool.descriptor.input_schema),
                    &self.config.truncation,
                ),
            })
            .collect();
        drop(snapshot);

        if requested.is_empty() {
            return Ok(0);
        }

        let model = embedder.model_name().to_string();
        let pending: std::collections::HashSet<Uuid> = store
            .tools_needing_embeddings(&requested, namespace, &model)
            .await?
            .into_iter()
            .collect();

        if pending.is_empty() {
            debug!("all embeddings up to date");
            return Ok(0);
        }

        let work: Vec<&RequestedEmbedding> = requested
            .iter()
            .filter(|r| pending.contains(&r.tool_uuid))
            .collect();

        let mut generated = 0u64;
        for (batch_index, batch) in work.chunks(RECONCILE_BATCH_SIZE).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(RECONCILE_BATCH_PAUSE).await;
            }

            let texts: Vec<String> = batch.iter().map(|r| r.embedding_text.clone()).collect();
            let vectors = embedder.generate_embeddings(&texts).await?;

            let rows: Vec<EmbeddingRow> = batch
                .iter()
                .zip(vectors)
                .map(|(request, embedding)| EmbeddingRow {
                    tool_uuid: request.tool_uuid,
                    namespace_uuid: namespace,
                    model_name: model.clone(),
                    embedding_dimensions: embedding.len() as i32,
                    embedding,
                    embedding_text: request.embedding_text.clone(),
                })
                .collect();

            store.upsert(&rows).await?;
            generated += rows.len() as u64;
        }

        self.metrics.record_embeddings_generated(generated);
        Ok(generated)
    }
}

fn schema_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
