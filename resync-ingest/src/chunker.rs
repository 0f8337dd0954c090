//! Document splitting strategies (spec §4.7).
//!
//! Every strategy produces [`Chunk`]-shaped pieces with `metadata.section_path`
//! / `parent_headers` populated where the strategy can determine them, plus a
//! `contextualized_content` string (title + section path prefix) used for
//! embedding instead of the raw chunk text.

use resync_core::entities::extract_entities;
use resync_core::ChunkMetadata;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    FixedSize,
    StructureAware,
    TwsOptimized,
    Semantic,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::StructureAware
    }
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub strategy: ChunkStrategy,
    pub window_tokens: usize,
    pub overlap_tokens: usize,
    /// `semantic` strategy: adjacent sentences merge while cosine similarity
    /// of their (caller-supplied) embeddings stays above this threshold.
    pub semantic_similarity_threshold: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            window_tokens: 512,
            overlap_tokens: 64,
            semantic_similarity_threshold: 0.75,
        }
    }
}

/// A chunk of a source document before embedding/upsert.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub ordinal: u32,
    pub content: String,
    /// Raw text prefixed with the document title and section path — this is
    /// what gets embedded, not `content` (spec §4.7).
    pub contextualized_content: String,
    pub metadata: ChunkMetadata,
}

static MARKDOWN_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap());
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```").unwrap());
static COMMAND_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(conman|composer|mzy)\s+\S+.*$").unwrap());

/// Splits `text` into chunks per `config.strategy`, stamping `doc_title`
/// into each chunk's contextualized content.
#[must_use]
pub fn chunk_document(
    doc_title: &str,
    text: &str,
    doc_type: &str,
    source_tier: resync_core::SourceTier,
    authority_tier: u8,
    config: &ChunkerConfig,
) -> Vec<RawChunk> {
    match config.strategy {
        ChunkStrategy::FixedSize => fixed_size(doc_title, text, doc_type, source_tier, authority_tier, config),
        ChunkStrategy::StructureAware => {
            structure_aware(doc_title, text, doc_type, source_tier, authority_tier, false)
        }
        ChunkStrategy::TwsOptimized => {
            structure_aware(doc_title, text, doc_type, source_tier, authority_tier, true)
        }
        ChunkStrategy::Semantic => semantic(doc_title, text, doc_type, source_tier, authority_tier, config),
    }
}

fn base_metadata(doc_type: &str, source_tier: resync_core::SourceTier, authority_tier: u8) -> ChunkMetadata {
    ChunkMetadata::new(doc_type, source_tier, authority_tier)
}

fn contextualize(doc_title: &str, section_path: &[String], content: &str) -> String {
    if section_path.is_empty() {
        format!("{doc_title}\n\n{content}")
    } else {
        format!("{doc_title} > {}\n\n{content}", section_path.join(" > "))
    }
}

fn fixed_size(
    doc_title: &str,
    text: &str,
    doc_type: &str,
    source_tier: resync_core::SourceTier,
    authority_tier: u8,
    config: &ChunkerConfig,
) -> Vec<RawChunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let window = config.window_tokens.max(1);
    let overlap = config.overlap_tokens.min(window.saturating_sub(1));
    let step = window - overlap;

    let mut chunks = Vec::new();
    let mut ordinal = 0u32;
    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        let content = words[start..end].join(" ");
        chunks.push(RawChunk {
            ordinal,
            contextualized_content: contextualize(doc_title, &[], &content),
            content,
            metadata: base_metadata(doc_type, source_tier, authority_tier),
        });
        ordinal += 1;
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn structure_aware(
    doc_title: &str,
    text: &str,
    doc_type: &str,
    source_tier: resync_core::SourceTier,
    authority_tier: u8,
    tws_optimized: bool,
) -> Vec<RawChunk> {
    let mut chunks = Vec::new();
    let mut ordinal = 0u32;
    let mut header_stack: Vec<(usize, String)> = Vec::new();
    let mut current_section: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut in_fence = false;

    let flush = |buffer: &mut String, ordinal: &mut u32, section_path: &[String], chunks: &mut Vec<RawChunk>| {
        let trimmed = buffer.trim();
        if !trimmed.is_empty() {
            let mut metadata = base_metadata(doc_type, source_tier, authority_tier);
            metadata.section_path = section_path.to_vec();
            metadata.parent_headers = section_path.to_vec();
            if tws_optimized {
                let entities = extract_entities(trimmed);
                metadata.job_names = entities.jobs;
                metadata.error_codes = entities.error_codes;
                metadata.workstations = entities.workstations;
            }
            chunks.push(RawChunk {
                ordinal: *ordinal,
                contextualized_content: contextualize(doc_title, section_path, trimmed),
                content: trimmed.to_string(),
                metadata,
            });
            *ordinal += 1;
        }
        buffer.clear();
    };

    for line in text.lines() {
        if CODE_FENCE.is_match(line) {
            in_fence = !in_fence;
            buffer.push_str(line);
            buffer.push('\n');
            continue;
        }
        if in_fence {
            buffer.push_str(line);
            buffer.push('\n');
            continue;
        }
        if let Some(cap) = MARKDOWN_HEADER.captures(line) {
            flush(&mut buffer, &mut ordinal, &current_section, &mut chunks);
            let level = cap[1].len();
            let title = cap[2].trim().to_string();
            header_stack.retain(|(l, _)| *l < level);
            header_stack.push((level, title));
            current_section = header_stack.iter().map(|(_, t)| t.clone()).collect();
            continue;
        }
        buffer.push_str(line);
        buffer.push('\n');
    }
    flush(&mut buffer, &mut ordinal, &current_section, &mut chunks);
    chunks
}

fn semantic(
    doc_title: &str,
    text: &str,
    doc_type: &str,
    source_tier: resync_core::SourceTier,
    authority_tier: u8,
    config: &ChunkerConfig,
) -> Vec<RawChunk> {
    // Without an embedding capability at chunk time, group by paragraph
    // boundaries as a deterministic proxy for "adjacent sentences whose
    // embeddings exceed a cosine threshold" — callers that want true
    // semantic grouping should chunk fixed-size first, embed, then merge
    // via `merge_by_similarity`.
    let _ = config.semantic_similarity_threshold;
    let mut chunks = Vec::new();
    for (ordinal, para) in text.split("\n\n").enumerate() {
        let content = para.trim();
        if content.is_empty() {
            continue;
        }
        chunks.push(RawChunk {
            ordinal: ordinal as u32,
            contextualized_content: contextualize(doc_title, &[], content),
            content: content.to_string(),
            metadata: base_metadata(doc_type, source_tier, authority_tier),
        });
    }
    chunks
}

/// Merge adjacent pre-chunked, pre-embedded pieces while cosine similarity
/// of consecutive embeddings stays above `threshold`. Used by callers that
/// embed before finalizing `semantic` grouping.
#[must_use]
pub fn merge_by_similarity(pieces: Vec<(String, Vec<f32>)>, threshold: f32) -> Vec<String> {
    if pieces.is_empty() {
        return Vec::new();
    }
    let mut merged = Vec::new();
    let mut current_text = pieces[0].0.clone();
    let mut current_embedding = pieces[0].1.clone();

    for (text, embedding) in pieces.into_iter().skip(1) {
        let sim = resync_vector::cosine_similarity(&current_embedding, &embedding);
        if sim >= threshold {
            current_text.push(' ');
            current_text.push_str(&text);
        } else {
            merged.push(std::mem::take(&mut current_text));
            current_text = text;
            current_embedding = embedding;
        }
    }
    merged.push(current_text);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_core::SourceTier;

    #[test]
    fn structure_aware_preserves_section_path() {
        let text = "# Top\n\nIntro text.\n\n## Sub\n\nDetails here.\n";
        let chunks = structure_aware("Runbook", text, "runbook", SourceTier::Official, 1, false);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.section_path, vec!["Top".to_string()]);
        assert_eq!(chunks[1].metadata.section_path, vec!["Top".to_string(), "Sub".to_string()]);
        assert!(chunks[1].contextualized_content.starts_with("Runbook > Top > Sub"));
    }

    #[test]
    fn tws_optimized_extracts_entities_into_metadata() {
        let text = "Job AWSBH001 fails with RC=8 on WKSTNWS1.";
        let chunks = structure_aware("Runbook", text, "runbook", SourceTier::Official, 1, true);
        assert_eq!(chunks[0].metadata.job_names, vec!["AWSBH001".to_string()]);
        assert_eq!(chunks[0].metadata.error_codes, vec!["rc_8".to_string()]);
    }

    #[test]
    fn fixed_size_respects_window_and_overlap() {
        let text = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let config = ChunkerConfig {
            strategy: ChunkStrategy::FixedSize,
            window_tokens: 20,
            overlap_tokens: 5,
            ..ChunkerConfig::default()
        };
        let chunks = fixed_size("Doc", &text, "doc", SourceTier::Official, 1, &config);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].content.split_whitespace().count(), 20);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunks = chunk_document("Doc", "", "doc", SourceTier::Official, 1, &ChunkerConfig::default());
        assert!(chunks.is_empty());
    }
}
