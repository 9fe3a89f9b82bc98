//! Proxy metrics for monitoring search and dispatch activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one namespace binding.
pub struct ProxyMetrics {
    // Discovery
    discover_calls: AtomicU64,
    lexical_searches: AtomicU64,
    vector_searches: AtomicU64,
    vector_fallbacks: AtomicU64,

    // Dispatch
    execute_calls: AtomicU64,
    execute_failures: AtomicU64,

    // Embedding maintenance
    reconcile_runs: AtomicU64,
    reconcile_failures: AtomicU64,
    embeddings_generated: AtomicU64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self {
            discover_calls: AtomicU64::new(0),
            lexical_searches: AtomicU64::new(0),
            vector_searches: AtomicU64::new(0),
            vector_fallbacks: AtomicU64::new(0),
            execute_calls: AtomicU64::new(0),
            execute_failures: AtomicU64::new(0),
            reconcile_runs: AtomicU64::new(0),
            reconcile_failures: AtomicU64::new(0),
            embeddings_generated: AtomicU64::new(0),
        }
    }

    pub fn record_discover(&self) {
        self.discover_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lexical_search(&self) {
        self.lexical_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vector_search(&self) {
        self.vector_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vector_fallback(&self) {
        self.vector_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute(&self, success: bool) {
        self.execute_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.execute_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reconcile(&self, success: bool) {
        self.reconcile_runs.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.reconcile_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_embeddings_generated(&self, count: u64) {
        self.embeddings_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            discover_calls: self.discover_calls.load(Ordering::Relaxed),
            lexical_searches: self.lexical_searches.load(Ordering::Relaxed),
            vector_searches: self.vector_searches.load(Ordering::Relaxed),
            vector_fallbacks: self.vector_fallbacks.load(Ordering::Relaxed),
            execute_calls: self.execute_calls.load(Ordering::Relaxed),
            execute_failures: self.execute_failures.load(Ordering::Relaxed),
            reconcile_runs: self.reconcile_runs.load(Ordering::Relaxed),
            reconcile_failures: self.reconcile_failures.load(Ordering::Relaxed),
            embeddings_generated: self.embeddings_generated.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub discover_calls: u64,
    pub lexical_searches: u64,
    pub vector_searches: u64,
    pub vector_fallbacks: u64,
    pub execute_calls: u64,
    pub execute_failures: u64,
    pub reconcile_runs: u64,
    pub reconcile_failures: u64,
    pub embeddings_generated: u64,
}
