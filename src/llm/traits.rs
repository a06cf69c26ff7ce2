//! Model endpoint seams used by the loop and the search tool.

use anyhow::Result;
use async_trait::async_trait;

/// A single text-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Generation halts before any of these sequences.
    pub stop: Vec<String>,
}

/// Anything that turns a rendered prompt into completion text.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model identifier, for logging.
    fn name(&self) -> &str;

    /// Request one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Anything that maps texts to embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
