use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    chunks_produced: AtomicU64,
    tables_normalized: AtomicU64,
    tables_degraded: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed document along with its chunk and table counters.
    pub fn record_document(&self, chunk_count: u64, normalized: u64, degraded: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_produced.fetch_add(chunk_count, Ordering::Relaxed);
        self.tables_normalized.fetch_add(normalized, Ordering::Relaxed);
        self.tables_degraded.fetch_add(degraded, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            tables_normalized: self.tables_normalized.load(Ordering::Relaxed),
            tables_degraded: self.tables_degraded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents processed since startup.
    pub documents_processed: u64,
    /// Total chunk count produced across all documents.
    pub chunks_produced: u64,
    /// Tables that completed structural normalization.
    pub tables_normalized: u64,
    /// Tables degraded to their original markup after a recognition failure.
    pub tables_degraded: u64,
}
