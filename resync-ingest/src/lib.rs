//! ABOUTME: Document chunking strategies and the idempotent ingestion pipeline
//! ABOUTME: Content-hash dedup against the read collection before embedding (spec §4.7)

pub mod chunker;
pub mod error;
pub mod ingestor;
pub mod metrics;

pub use chunker::{chunk_document, merge_by_similarity, ChunkStrategy, ChunkerConfig, RawChunk};
pub use error::{IngestError, Result};
pub use ingestor::{Ingestor, IngestorConfig};
pub use metrics::{IngestMetrics, IngestMetricsSnapshot};
