//! ABOUTME: Hybrid retrieval pipeline combining keyword and vector search
//! ABOUTME: BM25, query classification, fusion, gated reranking (spec §4.2-§4.6)

pub mod bm25;
pub mod classify;
pub mod error;
pub mod hybrid;
pub mod reranker;
pub mod router;
pub mod tokenizer;

pub use bm25::Bm25Index;
pub use classify::{classify_query, QueryClass, QueryClassificationCache, RetrievalWeights};
pub use error::{Result, RetrievalError};
pub use hybrid::{HybridConfig, HybridRetriever, RetrievalMetricsSnapshot};
pub use reranker::{
    CrossEncoderModel, CrossEncoderReranker, NoOpReranker, RerankCandidate, RerankGatingPolicy,
    Reranker,
};
pub use router::{GraphFacts, QueryRouter, RouteClassification, RouteIntent, RouteResult};
