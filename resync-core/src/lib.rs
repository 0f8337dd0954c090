//! ABOUTME: Shared foundation for the Resync operational-intelligence platform
//! ABOUTME: Error taxonomy, domain types, and capability traits every other crate builds on
//!
//! Holds the error taxonomy (spec §7), domain types (spec §3), capability
//! traits for out-of-core dependencies (spec §6), and the TWS identifier
//! regex suite shared by the tokenizer, intent classifier, and anaphora
//! resolution.

pub mod capabilities;
pub mod entities;
pub mod error;
pub mod types;

pub use capabilities::{CompletionParams, EmbeddingProvider, JobStatus, LlmProvider, TwsClient};
pub use error::{CoreError, CoreResult, RetryPolicy, StorageError};
pub use types::{
    sha256_hex, Chunk, ChunkId, ChunkMetadata, Document, JobKey, MetadataFilter, SourceTier,
    VectorHit,
};
