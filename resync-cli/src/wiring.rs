//! Builds every long-lived component exactly once at process startup
//! (spec §9 "global singletons... construct once at startup") and hands
//! out `Arc` handles to the command handlers.

use crate::providers::{EchoLlm, HashEmbedder, UnconfiguredTwsClient};
use anyhow::{Context, Result};
use resync_agent::{AgentRouter, AgentRouterConfig, DiagnosticConfig, DiagnosticGraph, IntentClassifier};
use resync_agent::tools::ToolCatalog;
use resync_audit::{AuditQueue, RedisAuditQueue};
use resync_config::ResyncConfig;
use resync_core::capabilities::{EmbeddingProvider, LlmProvider, TwsClient};
use resync_graph::{KnowledgeGraph, TwsKnowledgeGraph};
use resync_ingest::{Ingestor, IngestorConfig};
use resync_lock::{DistributedLock, RedisLock};
use resync_memory::{
    ConversationMemory, LongTermMemoryManager, MemoryExtractor, RedisLongTermStore, RedisSessionStore,
};
use resync_retrieval::{Bm25Index, HybridConfig, HybridRetriever, NoOpReranker, RerankGatingPolicy, Reranker};
use resync_vector::{PostgresVectorConfig, PostgresVectorStore, VectorStore};
use std::sync::Arc;
use std::time::Duration;

/// TTL for the on-demand dependency graph snapshot. Not an exposed config
/// option yet — §4.5 only calls for "seconds-to-minutes".
const GRAPH_SNAPSHOT_TTL: Duration = Duration::from_secs(120);

pub struct Runtime {
    pub config: ResyncConfig,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub tws: Arc<dyn TwsClient>,
    pub hybrid: Arc<HybridRetriever>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub lock: Arc<dyn DistributedLock>,
    pub audit: Arc<dyn AuditQueue>,
    pub conversation: Arc<ConversationMemory>,
    pub long_term: Arc<LongTermMemoryManager>,
    pub router: Arc<AgentRouter>,
    pub ingestor: Arc<Ingestor>,
}

impl Runtime {
    pub async fn build(config: ResyncConfig) -> Result<Self> {
        let redis_pool = deadpool_redis::Config::from_url(&config.storage.redis_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("building redis connection pool")?;

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(config.storage.embed_dim));
        let llm: Arc<dyn LlmProvider> = Arc::new(EchoLlm);
        let tws: Arc<dyn TwsClient> = Arc::new(UnconfiguredTwsClient);

        // StorageConfig only enumerates one pool min/max pair; reuse it for
        // Postgres too since §6 doesn't give it a separate one.
        let vector_store: Arc<dyn VectorStore> = match PostgresVectorStore::connect(&PostgresVectorConfig {
            database_url: config.storage.database_url.clone(),
            pool_min_size: config.storage.redis_pool_min_size as usize,
            pool_max_size: config.storage.redis_pool_max_size as usize,
        }) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "could not reach postgres, falling back to an in-memory vector store");
                Arc::new(resync_vector::InMemoryVectorStore::new())
            }
        };

        let bm25 = Arc::new(Bm25Index::new(vector_store.clone(), config.storage.collection_read.clone()));
        let reranker: Arc<dyn Reranker> = Arc::new(NoOpReranker);
        let gating = RerankGatingPolicy {
            low_confidence_threshold: config.retrieval.rerank_score_low_threshold,
            margin_threshold: config.retrieval.rerank_margin_threshold,
            max_candidates: config.retrieval.rerank_max_candidates,
        };
        let hybrid_config = HybridConfig {
            defaults: resync_retrieval::RetrievalWeights {
                vector: config.retrieval.vector_weight,
                bm25: config.retrieval.keyword_weight,
            },
            cache_capacity: config.cache.query_cache_max_size,
            cache_ttl: Duration::from_secs(config.cache.query_cache_ttl_seconds),
            ..HybridConfig::default()
        };
        let hybrid = Arc::new(HybridRetriever::new(
            vector_store.clone(),
            bm25,
            reranker,
            gating,
            embedder.clone(),
            config.storage.collection_read.clone(),
            hybrid_config,
        ));

        let graph: Arc<dyn KnowledgeGraph> = Arc::new(TwsKnowledgeGraph::new(tws.clone(), GRAPH_SNAPSHOT_TTL));
        let lock: Arc<dyn DistributedLock> = Arc::new(RedisLock::new(redis_pool.clone(), "resync:lock"));
        let audit: Arc<dyn AuditQueue> = Arc::new(RedisAuditQueue::new(redis_pool.clone()));

        let session_store = Arc::new(RedisSessionStore::new(redis_pool.clone(), "resync:session"));
        let conversation = Arc::new(ConversationMemory::new(session_store));

        let long_term_store = Arc::new(RedisLongTermStore::new(redis_pool.clone(), "resync:ltm"));
        let long_term = Arc::new(LongTermMemoryManager::new(
            long_term_store,
            MemoryExtractor::new(llm.clone()),
            embedder.clone(),
        ));

        let diagnostic_config = DiagnosticConfig {
            max_iterations: config.diagnostic.max_iterations,
            min_confidence_for_proposal: config.diagnostic.min_confidence_for_proposal,
            require_approval_for_actions: config.diagnostic.require_approval_for_actions,
        };
        let diagnostic = DiagnosticGraph::new(
            hybrid.clone(),
            graph.clone(),
            long_term.clone(),
            embedder.clone(),
            llm.clone(),
            ToolCatalog::new(tws.clone()),
            audit.clone(),
            lock.clone(),
            diagnostic_config,
        );

        let classifier = IntentClassifier::new(Some(llm.clone()));
        let router = Arc::new(AgentRouter::new(
            classifier,
            hybrid.clone(),
            llm.clone(),
            ToolCatalog::new(tws.clone()),
            diagnostic,
            audit.clone(),
            AgentRouterConfig::default(),
        ));

        let ingestor = Arc::new(Ingestor::new(
            vector_store.clone(),
            embedder.clone(),
            IngestorConfig::new(
                config.storage.collection_read.clone(),
                config.storage.collection_write.clone(),
                config.storage.embed_dim,
            ),
        ));

        Ok(Self {
            config,
            vector_store,
            embedder,
            llm,
            tws,
            hybrid,
            graph,
            lock,
            audit,
            conversation,
            long_term,
            router,
            ingestor,
        })
    }
}
