//! Build an embedding index by chunking and embedding the target tree.

use super::EmbeddingIndex;
use crate::llm::Embedder;
use crate::types::IndexedChunk;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Texts sent per embedding request.
const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
    pub max_file_bytes: u64,
}

/// A chunk before embedding: (start_line, end_line, text), 1-indexed inclusive.
pub type RawChunk = (usize, usize, String);

/// Split text into windows of `lines` lines sharing `overlap` lines.
pub fn chunk_text(content: &str, lines: usize, overlap: usize) -> Vec<RawChunk> {
    let all: Vec<&str> = content.lines().collect();
    if all.is_empty() || lines == 0 {
        return Vec::new();
    }
    let step = lines.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + lines).min(all.len());
        let text = all[start..end].join("\n");
        if !text.trim().is_empty() {
            chunks.push((start + 1, end, text));
        }
        if end == all.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Walk `root`, embed every eligible file, and return the index.
pub async fn build_index(
    root: &Path,
    embedder: &dyn Embedder,
    options: &IndexOptions,
) -> Result<EmbeddingIndex> {
    if options.chunk_overlap >= options.chunk_lines {
        bail!("chunk_overlap must be smaller than chunk_lines");
    }

    let mut pending: Vec<(String, RawChunk)> = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        e.depth() == 0
            || !options
                .ignore
                .iter()
                .any(|i| e.file_name().to_string_lossy() == i.as_str())
    });

    for entry in walker {
        let entry = entry.context("Failed to walk target tree")?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), &options.extensions) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > options.max_file_bytes {
            debug!("Skipping large file {}", entry.path().display());
            continue;
        }

        let content = match std::fs::read(entry.path()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let source = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for chunk in chunk_text(&content, options.chunk_lines, options.chunk_overlap) {
            pending.push((source.clone(), chunk));
        }
    }

    info!("Embedding {} chunks with {}", pending.len(), embedder.model());

    let mut chunks = Vec::with_capacity(pending.len());
    for batch in pending.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|(_, (_, _, text))| text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }
        for ((source, (start_line, end_line, text)), embedding) in batch.iter().zip(vectors) {
            chunks.push(IndexedChunk {
                source: source.clone(),
                start_line: *start_line,
                end_line: *end_line,
                text: text.clone(),
                embedding,
            });
        }
    }

    let dimensions = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
    if chunks.iter().any(|c| c.embedding.len() != dimensions) {
        bail!("Embedder returned vectors of inconsistent dimension");
    }

    Ok(EmbeddingIndex {
        model: embedder.model().to_string(),
        dimensions,
        created_at: Utc::now(),
        chunks,
    })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}
