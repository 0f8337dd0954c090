//! ABOUTME: Central configuration surface for Resync (spec §6)
//! ABOUTME: Layered TOML + environment overrides composed into one typed config
//!
//! Loads a layered TOML file (defaults, then `resync.toml`, then
//! `RESYNC_`-prefixed environment variables). Every recognized option from
//! spec §6 is represented here with its documented default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file discovery order, closest-to-cwd first.
const CONFIG_SEARCH_PATHS: &[&str] = &["resync.toml", ".resync.toml", "config/resync.toml"];

const ENV_PREFIX: &str = "RESYNC";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub redis_url: String,
    pub database_url: String,
    pub redis_pool_min_size: u32,
    pub redis_pool_max_size: u32,
    pub redis_health_check_interval_seconds: u64,
    pub collection_read: String,
    pub collection_write: String,
    pub embed_dim: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            database_url: "postgres://localhost:5432/resync".to_string(),
            redis_pool_min_size: 2,
            redis_pool_max_size: 10,
            redis_health_check_interval_seconds: 30,
            collection_read: "tws_docs".to_string(),
            collection_write: "tws_docs".to_string(),
            embed_dim: 1536,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub vector_top_k: usize,
    pub vector_threshold: f32,
    pub enable_reranking: bool,
    pub rerank_top_k: usize,
    pub rerank_score_low_threshold: f32,
    pub rerank_margin_threshold: f32,
    pub rerank_max_candidates: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub hnsw_ef_search_base: u32,
    pub hnsw_ef_search_max: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 20,
            vector_threshold: 0.7,
            enable_reranking: true,
            rerank_top_k: 5,
            rerank_score_low_threshold: 0.35,
            rerank_margin_threshold: 0.05,
            rerank_max_candidates: 10,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            hnsw_ef_search_base: 64,
            hnsw_ef_search_max: 128,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub query_cache_enabled: bool,
    pub query_cache_max_size: usize,
    pub query_cache_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_cache_enabled: true,
            query_cache_max_size: 1000,
            query_cache_ttl_seconds: 1800,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    pub max_iterations: u32,
    pub min_confidence_for_proposal: f32,
    pub require_approval_for_actions: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            min_confidence_for_proposal: 0.7,
            require_approval_for_actions: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub audit_retention_days: u32,
    pub lock_timeout_seconds: u64,
    pub lock_cleanup_max_age_seconds: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit_retention_days: 30,
            lock_timeout_seconds: 30,
            lock_cleanup_max_age_seconds: 60,
        }
    }
}

/// Top-level Resync configuration, composed from the sections above.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResyncConfig {
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub diagnostic: DiagnosticConfig,
    pub audit: AuditConfig,
}

impl ResyncConfig {
    /// Load defaults overlaid by the first config file found in
    /// [`CONFIG_SEARCH_PATHS`] (if any), then by `RESYNC_*` environment
    /// variables (e.g. `RESYNC_STORAGE__REDIS_URL`).
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        for path in CONFIG_SEARCH_PATHS {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
                break;
            }
        }

        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build().context("building configuration")?;
        raw.try_deserialize().context("deserializing ResyncConfig")
    }

    /// Load from an explicit TOML file, bypassing discovery. Used by tests
    /// and by callers that pin a config path explicitly.
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        let raw = builder.build().context("building configuration")?;
        raw.try_deserialize().context("deserializing ResyncConfig")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let cfg = ResyncConfig::default();
        assert_eq!(cfg.retrieval.vector_top_k, 20);
        assert!((cfg.retrieval.rerank_score_low_threshold - 0.35).abs() < f32::EPSILON);
        assert_eq!(cfg.diagnostic.max_iterations, 5);
        assert_eq!(cfg.audit.lock_timeout_seconds, 30);
    }

    #[test]
    fn loads_overrides_from_toml_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("resync.toml");
        std::fs::write(
            &path,
            r#"
            [retrieval]
            vector_top_k = 42
            "#,
        )?;
        let cfg = ResyncConfig::load_from(&path)?;
        assert_eq!(cfg.retrieval.vector_top_k, 42);
        assert_eq!(cfg.retrieval.vector_weight, 0.6);
        Ok(())
    }
}
