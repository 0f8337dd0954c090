use crate::cli::{AuditAction, Command};
use crate::wiring::Runtime;
use anyhow::{bail, Context, Result};
use resync_audit::AuditStatus;
use resync_core::SourceTier;
use resync_ingest::{chunk_document, ChunkStrategy, ChunkerConfig};
use std::path::Path;

pub async fn execute(command: Command, runtime: &Runtime) -> Result<()> {
    match command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&runtime.config)?);
        }
        Command::Ingest { path, document_id, strategy } => {
            run_ingest(runtime, &path, &document_id, &strategy).await?;
        }
        Command::Chat { session, user, message } => {
            run_chat(runtime, session, &user, &message).await?;
        }
        Command::Audit { action } => run_audit(runtime, action).await?,
    }
    Ok(())
}

fn parse_strategy(name: &str) -> Result<ChunkStrategy> {
    Ok(match name {
        "fixed-size" => ChunkStrategy::FixedSize,
        "structure-aware" => ChunkStrategy::StructureAware,
        "tws-optimized" => ChunkStrategy::TwsOptimized,
        "semantic" => ChunkStrategy::Semantic,
        other => bail!("unknown chunk strategy '{other}'; expected fixed-size, structure-aware, tws-optimized, or semantic"),
    })
}

async fn run_ingest(runtime: &Runtime, path: &Path, document_id: &str, strategy: &str) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc_title = path.file_stem().and_then(|s| s.to_str()).unwrap_or(document_id);

    let config = ChunkerConfig { strategy: parse_strategy(strategy)?, ..ChunkerConfig::default() };
    let chunks = chunk_document(doc_title, &text, "document", SourceTier::Curated, 3, &config);
    let count = chunks.len();

    let written = runtime.ingestor.ingest(document_id, chunks).await.context("ingesting document")?;
    println!("chunked {doc_title} into {count} piece(s), wrote {written} new chunk(s) to the vector store");
    Ok(())
}

async fn run_chat(runtime: &Runtime, session: Option<String>, user: &str, message: &str) -> Result<()> {
    let resolved_message = match &session {
        Some(id) => match runtime.conversation.get(id).await? {
            Some(context) => resync_memory::ConversationMemory::resolve_reference(&context, message),
            None => message.to_string(),
        },
        None => message.to_string(),
    };

    let response = runtime.router.route(&resolved_message, user, None).await?;

    let turn = runtime
        .conversation
        .add_turn(session.as_deref(), message, &response.response, None)
        .await?;

    println!("session: {}", turn.session_id);
    println!("intent: {} (confidence {:.2})", response.intent.as_str(), response.confidence);
    println!("handler: {}", response.handler);
    if !response.tools_used.is_empty() {
        println!("tools used: {}", response.tools_used.join(", "));
    }
    if response.requires_approval {
        println!("flagged for review: {}", response.approval_id.as_deref().unwrap_or("?"));
    }
    println!("\n{}", response.response);
    Ok(())
}

async fn run_audit(runtime: &Runtime, action: AuditAction) -> Result<()> {
    match action {
        AuditAction::List { limit } => {
            let pending = runtime.audit.get_pending(limit).await?;
            if pending.is_empty() {
                println!("no pending audit records");
            }
            for record in pending {
                println!(
                    "{}  confidence={:.2}  query={:?}",
                    record.memory_id, record.ia_audit_confidence, record.user_query
                );
            }
        }
        AuditAction::Approve { memory_id } => {
            let updated = runtime.audit.update_status(&memory_id, AuditStatus::Approved).await?;
            println!("{}", if updated { "approved" } else { "no such record" });
        }
        AuditAction::Reject { memory_id } => {
            let updated = runtime.audit.update_status(&memory_id, AuditStatus::Rejected).await?;
            println!("{}", if updated { "rejected" } else { "no such record" });
        }
    }
    Ok(())
}
