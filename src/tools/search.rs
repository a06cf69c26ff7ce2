//! Vector similarity search over the persisted embedding index.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::traits::{optional_usize, required_str};
use super::Tool;
use crate::error::ToolError;
use crate::index::EmbeddingIndex;
use crate::llm::Embedder;

pub struct CodeSearch {
    index_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    default_top_k: usize,
    /// Loaded on first use; a failed load is retried on the next call.
    index: OnceCell<Arc<EmbeddingIndex>>,
}

impl CodeSearch {
    pub fn new(index_path: PathBuf, embedder: Arc<dyn Embedder>, default_top_k: usize) -> Self {
        Self {
            index_path,
            embedder,
            default_top_k: default_top_k.max(1),
            index: OnceCell::new(),
        }
    }

    async fn index(&self) -> Result<Arc<EmbeddingIndex>, ToolError> {
        self.index
            .get_or_try_init(|| async {
                let path = self.index_path.clone();
                let loaded = tokio::task::spawn_blocking(move || EmbeddingIndex::load(&path))
                    .await
                    .map_err(|e| ToolError::Index(e.to_string()))?
                    .map_err(|e| ToolError::Index(format!("{:#}", e)))?;
                Ok::<_, ToolError>(Arc::new(loaded))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Tool for CodeSearch {
    fn name(&self) -> &str {
        "custom_search"
    }

    fn description(&self) -> &str {
        "Useful for when you need to answer questions about code. Input is a search query; returns the most relevant code chunks."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "should be a search query"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of chunks to return"
                }
            },
            "required": ["query"]
        })
    }

    fn primary_arg(&self) -> &str {
        "query"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        let top_k = optional_usize(&args, "top_k")?.unwrap_or(self.default_top_k);

        let index = self.index().await?;
        if index.chunks.is_empty() {
            return Ok(format!("No indexed code matches: {}", query));
        }
        if index.model != self.embedder.model() {
            return Err(ToolError::Index(format!(
                "index was built with '{}' but the search embedder is '{}'",
                index.model,
                self.embedder.model()
            )));
        }

        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| ToolError::Embedding(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Embedding("no vector returned".into()))?;

        let hits = index
            .top_k(&vector, top_k)
            .map_err(|e| ToolError::Index(e.to_string()))?;
        if hits.is_empty() {
            return Ok(format!("No indexed code matches: {}", query));
        }

        Ok(hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "[{}] {}:{}-{} (score {:.3})\n```\n{}\n```",
                    i + 1,
                    hit.chunk.source,
                    hit.chunk.start_line,
                    hit.chunk.end_line,
                    hit.score,
                    hit.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexedChunk;
    use anyhow::Result;
    use chrono::Utc;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model(&self) -> &str {
            "axis"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("sql") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    fn write_index(path: &std::path::Path, model: &str) {
        let chunk = |source: &str, embedding: Vec<f32>| IndexedChunk {
            source: source.into(),
            start_line: 1,
            end_line: 3,
            text: format!("// {}", source),
            embedding,
        };
        EmbeddingIndex {
            model: model.into(),
            dimensions: 2,
            created_at: Utc::now(),
            chunks: vec![
                chunk("routes/search.ts", vec![0.9, 0.1]),
                chunk("routes/profile.ts", vec![0.1, 0.9]),
            ],
        }
        .save(path)
        .unwrap();
    }

    #[tokio::test]
    async fn returns_best_chunk_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        write_index(&path, "axis");

        let tool = CodeSearch::new(path, Arc::new(AxisEmbedder), 1);
        let out = tool.execute(json!({"query": "raw sql query"})).await.unwrap();
        assert!(out.starts_with("[1] routes/search.ts:1-3"));
        assert!(!out.contains("profile"));
    }

    #[tokio::test]
    async fn missing_index_is_recoverable_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let tool = CodeSearch::new(path.clone(), Arc::new(AxisEmbedder), 2);

        let err = tool.execute(json!({"query": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::Index(_)));

        write_index(&path, "axis");
        assert!(tool.execute(json!({"query": "x"})).await.is_ok());
    }

    #[tokio::test]
    async fn empty_index_reports_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        EmbeddingIndex {
            model: "axis".into(),
            dimensions: 0,
            created_at: Utc::now(),
            chunks: vec![],
        }
        .save(&path)
        .unwrap();

        let tool = CodeSearch::new(path, Arc::new(AxisEmbedder), 2);
        let out = tool.execute(json!({"query": "raw sql query"})).await.unwrap();
        assert_eq!(out, "No indexed code matches: raw sql query");
    }

    #[tokio::test]
    async fn model_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        write_index(&path, "other-model");

        let tool = CodeSearch::new(path, Arc::new(AxisEmbedder), 2);
        let err = tool.execute(json!({"query": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::Index(_)));
    }
}
