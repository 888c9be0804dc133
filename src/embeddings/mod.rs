// Embeddings module
// Text chunking and the embedding backends that turn chunks into vectors

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::{ContractQaError, Result};

pub use chunking::{Chunk, ChunkingConfig, chunk_pages, split_text};
pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, otherwise retrieval is not reproducible.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, returning one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ContractQaError::Embedding("embedder returned no vector".to_string()))
    }

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Human-readable model name, used in logs
    fn name(&self) -> &str;
}
