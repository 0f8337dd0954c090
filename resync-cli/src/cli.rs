use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "resync", about = "TWS operational-intelligence platform", version)]
pub struct Cli {
    /// Path to a resync.toml config file; falls back to discovery + env vars.
    #[arg(long, global = true, env = "RESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the effective configuration after layering defaults, file, and env.
    Config,
    /// Chunk and ingest a document into the vector store.
    Ingest {
        /// Path to the document to ingest.
        path: PathBuf,
        /// Stable identifier for the document; chunks dedup against it on re-ingest.
        #[arg(long)]
        document_id: String,
        #[arg(long, default_value = "structure-aware")]
        strategy: String,
    },
    /// Run a single chat turn through intent classification and routing.
    Chat {
        /// Resume an existing conversation session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
        /// Identifies the operator for LongTermMemory partitioning (spec §4.11).
        #[arg(long, default_value = "default-user")]
        user: String,
        message: String,
    },
    /// Inspect and resolve entries awaiting human review.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(Subcommand)]
pub enum AuditAction {
    /// List pending audit records.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Approve { memory_id: String },
    Reject { memory_id: String },
}
