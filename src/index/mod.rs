//! Persisted embedding index over the target source tree.
//!
//! The index is a single JSON document: the embedding model it was built
//! with, the vector dimension, and every chunk with its vector. It is
//! written once by [`build_index`] and only read afterwards.

pub mod builder;

pub use builder::{build_index, chunk_text, IndexOptions};

use crate::types::{IndexedChunk, ScoredChunk};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

impl EmbeddingIndex {
    /// Load and sanity-check an index file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index {}", path.display()))?;
        let index: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Index {} is corrupt", path.display()))?;

        if let Some(bad) = index
            .chunks
            .iter()
            .find(|c| c.embedding.len() != index.dimensions)
        {
            bail!(
                "Index {} is corrupt: chunk from {} has {} dimensions, expected {}",
                path.display(),
                bad.source,
                bad.embedding.len(),
                index.dimensions
            );
        }

        info!(
            "Loaded index {} ({} chunks, model {})",
            path.display(),
            index.chunks.len(),
            index.model
        );
        Ok(index)
    }

    /// Write the index via a temp file so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(self).context("Failed to serialize index")?;
        std::fs::write(&tmp, body)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move index into {}", path.display()))?;
        Ok(())
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk<'_>>> {
        if query.len() != self.dimensions {
            bail!(
                "Query embedding has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            );
        }

        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query, &chunk.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}
