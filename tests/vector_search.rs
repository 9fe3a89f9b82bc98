//! Vector-mode behavior: reconciliation, similarity ranking, and the
//! lexical fallback when the embedding backend is unavailable.

mod common;

use std::sync::Arc;

use common::{
    bound_tool, parse_descriptors, result_text, MemoryStore, RecordingConnection, StubEmbedder,
};
use toolgate::{EmbeddingRow, EmbeddingStore, ProxyConfig, SearchMode, SmartProxy};
use uuid::Uuid;

fn vector_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.search_mode = SearchMode::Embeddings;
    config
}

fn vector_proxy(
    namespace: Uuid,
    embedder: &Arc<StubEmbedder>,
    store: &Arc<MemoryStore>,
) -> SmartProxy {
    let embedder: Arc<dyn toolgate::EmbeddingBackend> = Arc::clone(embedder) as Arc<dyn toolgate::EmbeddingBackend>;
    let store: Arc<dyn EmbeddingStore> = Arc::clone(store) as Arc<dyn EmbeddingStore>;
    SmartProxy::new(vector_config())
        .unwrap()
        .with_vector_search(namespace, embedder, store)
}

#[tokio::test]
async fn bind_reconciles_embeddings_once() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    let tool_uuid = Uuid::new_v4();
    let tools = || {
        vec![bound_tool(
            "docs",
            "summarize",
            "A long paragraph.\n{schema: \"noise\"}",
            RecordingConnection::new("docs"),
            tool_uuid,
        )]
    };

    proxy.bind(tools()).await.unwrap();

    let rows = store.rows_for_namespace(namespace);
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].embedding_text,
        "summarize: A long paragraph.\nParameters: none"
    );
    assert_eq!(rows[0].embedding_dimensions as usize, rows[0].embedding.len());
    assert_eq!(rows[0].model_name, "BAAI/bge-m3");
    assert_eq!(embedder.request_count(), 1);

    // Unchanged rebind: the staleness check finds nothing to do.
    proxy.bind(tools()).await.unwrap();
    assert_eq!(embedder.request_count(), 1);
    assert_eq!(store.rows_for_namespace(namespace).len(), 1);
}

#[tokio::test]
async fn description_change_regenerates_only_that_tool() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    let weather_uuid = Uuid::new_v4();
    let git_uuid = Uuid::new_v4();

    proxy
        .bind(vec![
            bound_tool(
                "weather",
                "get_forecast",
                "Returns the forecast for a city.",
                RecordingConnection::new("weather"),
                weather_uuid,
            ),
            bound_tool(
                "git",
                "commit",
                "Create a git commit.",
                RecordingConnection::new("git"),
                git_uuid,
            ),
        ])
        .await
        .unwrap();
    assert_eq!(embedder.texts_embedded(), 2);

    let git_row_before = store.row_for_tool(git_uuid, namespace).unwrap();

    proxy
        .bind(vec![
            bound_tool(
                "weather",
                "get_forecast",
                "Returns the hourly forecast for a city.",
                RecordingConnection::new("weather"),
                weather_uuid,
            ),
            bound_tool(
                "git",
                "commit",
                "Create a git commit.",
                RecordingConnection::new("git"),
                git_uuid,
            ),
        ])
        .await
        .unwrap();

    // Exactly one regeneration: the changed description.
    assert_eq!(embedder.texts_embedded(), 3);

    let weather_row = store.row_for_tool(weather_uuid, namespace).unwrap();
    assert!(weather_row.embedding_text.contains("hourly"));

    let git_row_after = store.row_for_tool(git_uuid, namespace).unwrap();
    assert_eq!(git_row_after.embedding_text, git_row_before.embedding_text);
    assert_eq!(git_row_after.embedding, git_row_before.embedding);
}

#[tokio::test]
async fn vector_discover_ranks_by_similarity() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    proxy
        .bind(vec![
            bound_tool(
                "weather",
                "get_forecast",
                "Weather forecast for a city",
                RecordingConnection::new("weather"),
                Uuid::new_v4(),
            ),
            bound_tool(
                "calc",
                "add",
                "Add two numbers together",
                RecordingConnection::new("calc"),
                Uuid::new_v4(),
            ),
        ])
        .await
        .unwrap();

    let result = proxy
        .discover(&["weather forecast".to_string()])
        .await
        .unwrap();
    let descriptors = parse_descriptors(&result);

    assert!(!descriptors.is_empty());
    assert_eq!(descriptors[0]["toolId"], "weather");
    assert_eq!(descriptors[0]["method"], "get_forecast");
    assert!(descriptors[0].get("score").is_none());
    assert_eq!(proxy.metrics().snapshot().vector_searches, 1);
}

#[tokio::test]
async fn unbound_tool_uuids_are_dropped_from_results() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    proxy
        .bind(vec![bound_tool(
            "weather",
            "get_forecast",
            "Weather forecast for a city",
            RecordingConnection::new("weather"),
            Uuid::new_v4(),
        )])
        .await
        .unwrap();

    // A row for a tool that was unbound after embedding: most similar
    // to the query, but no longer part of the catalogue.
    store
        .upsert(&[EmbeddingRow {
            tool_uuid: Uuid::new_v4(),
            namespace_uuid: namespace,
            model_name: "BAAI/bge-m3".to_string(),
            embedding_dimensions: 16,
            embedding: StubEmbedder::embed_text("stale entry"),
            embedding_text: "stale entry".to_string(),
        }])
        .await
        .unwrap();

    let result = proxy.discover(&["stale entry".to_string()]).await.unwrap();
    let descriptors = parse_descriptors(&result);
    for descriptor in &descriptors {
        assert_eq!(descriptor["toolId"], "weather");
    }
}

#[tokio::test]
async fn offline_embedder_downgrades_to_keyword_search() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    embedder.set_fail(true);
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    proxy
        .bind(vec![
            bound_tool(
                "weather",
                "get_forecast",
                "Returns the forecast for a city.",
                RecordingConnection::new("weather"),
                Uuid::new_v4(),
            ),
            bound_tool(
                "git",
                "commit",
                "Create a git commit.",
                RecordingConnection::new("git"),
                Uuid::new_v4(),
            ),
        ])
        .await
        .unwrap();

    // The bind-time reconciliation attempt is the only request made.
    let requests_after_bind = embedder.request_count();
    assert_eq!(requests_after_bind, 1);

    let result = proxy.discover(&["forecast".to_string()]).await.unwrap();
    let descriptors = parse_descriptors(&result);
    assert_eq!(descriptors[0]["method"], "get_forecast");

    proxy.discover(&["commit".to_string()]).await.unwrap();

    // Keyword search answered both calls without retrying the backend.
    assert_eq!(embedder.request_count(), requests_after_bind);
    assert!(proxy.metrics().snapshot().lexical_searches >= 2);
}

#[tokio::test]
async fn query_time_failure_falls_back_and_sticks() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    proxy
        .bind(vec![bound_tool(
            "weather",
            "get_forecast",
            "Returns the forecast for a city.",
            RecordingConnection::new("weather"),
            Uuid::new_v4(),
        )])
        .await
        .unwrap();
    let requests_after_bind = embedder.request_count();

    embedder.set_fail(true);

    let result = proxy.discover(&["forecast".to_string()]).await.unwrap();
    assert!(result_text(&result).contains("get_forecast"));
    assert_eq!(embedder.request_count(), requests_after_bind + 1);
    assert_eq!(proxy.metrics().snapshot().vector_fallbacks, 1);

    // The session stays lexical; the embedding endpoint is not retried.
    proxy.discover(&["forecast".to_string()]).await.unwrap();
    assert_eq!(embedder.request_count(), requests_after_bind + 1);
}

#[tokio::test]
async fn purge_embeddings_clears_the_namespace() {
    let namespace = Uuid::new_v4();
    let embedder = StubEmbedder::new();
    let store = MemoryStore::new();
    let proxy = vector_proxy(namespace, &embedder, &store);

    proxy
        .bind(vec![bound_tool(
            "weather",
            "get_forecast",
            "Weather forecast for a city",
            RecordingConnection::new("weather"),
            Uuid::new_v4(),
        )])
        .await
        .unwrap();
    assert!(store.has_embeddings(namespace).await.unwrap());

    let deleted = proxy.purge_embeddings().await.unwrap();
    assert_eq!(deleted, 1);
    assert!(!store.has_embeddings(namespace).await.unwrap());
}
