//! Ingestion counters and histograms (spec §4.7).

use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct IngestMetricsSnapshot {
    pub chunks_ingested: u64,
    pub bytes_embedded: u64,
    pub dedup_hits: u64,
    pub embed_duration_total: Duration,
    pub embed_calls: u64,
    pub upsert_duration_total: Duration,
    pub upsert_calls: u64,
}

impl IngestMetricsSnapshot {
    #[must_use]
    pub fn avg_embed_ms(&self) -> f64 {
        if self.embed_calls == 0 {
            0.0
        } else {
            self.embed_duration_total.as_secs_f64() * 1000.0 / self.embed_calls as f64
        }
    }

    #[must_use]
    pub fn avg_upsert_ms(&self) -> f64 {
        if self.upsert_calls == 0 {
            0.0
        } else {
            self.upsert_duration_total.as_secs_f64() * 1000.0 / self.upsert_calls as f64
        }
    }
}

/// Thread-safe ingestion metrics accumulator.
#[derive(Default)]
pub struct IngestMetrics {
    inner: Mutex<IngestMetricsSnapshot>,
}

impl IngestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dedup_hit(&self) {
        self.inner.lock().dedup_hits += 1;
    }

    pub fn record_embed(&self, bytes: u64, duration: Duration) {
        let mut m = self.inner.lock();
        m.bytes_embedded += bytes;
        m.embed_duration_total += duration;
        m.embed_calls += 1;
    }

    pub fn record_upsert(&self, chunks: u64, duration: Duration) {
        let mut m = self.inner.lock();
        m.chunks_ingested += chunks;
        m.upsert_duration_total += duration;
        m.upsert_calls += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> IngestMetricsSnapshot {
        self.inner.lock().clone()
    }
}
