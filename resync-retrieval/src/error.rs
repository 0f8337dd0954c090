use resync_core::CoreError;
use resync_vector::VectorStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Vector(#[from] VectorStoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Rerank(#[from] crate::reranker::RerankError),

    #[error(transparent)]
    Graph(#[from] resync_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
