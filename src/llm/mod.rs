pub mod embeddings;
pub mod inference;
pub mod traits;

pub use embeddings::EmbeddingClient;
pub use inference::InferenceClient;
pub use traits::{CompletionModel, CompletionRequest, Embedder};
