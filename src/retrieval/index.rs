use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{ContractQaError, Result};
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::embeddings::{Chunk, Embedder};

/// Persistent chunk index: embeds chunks and answers nearest-neighbour queries
///
/// Writers take the store lock exclusively, so a search never observes a
/// partially written document.
pub struct VectorIndex {
    store: RwLock<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Attach to the index at `path`, initialising it when absent
    #[inline]
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store = VectorStore::open(path, embedder.dimension()).await?;

        Ok(Self {
            store: RwLock::new(store),
            embedder,
        })
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Embed and append chunks of one document, returning how many were stored
    #[inline]
    pub async fn add(&self, document_id: &str, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        debug!(
            "Embedding {} chunks with {}",
            texts.len(),
            self.embedder.name()
        );
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(ContractQaError::Embedding(format!(
                "{} returned {} vectors for {} chunks",
                self.embedder.name(),
                vectors.len(),
                chunks.len()
            )));
        }

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: ChunkMetadata {
                    document_id: document_id.to_string(),
                    source: chunk.source.clone(),
                    page_number: chunk.page_number,
                    chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                    content: chunk.content.clone(),
                    created_at: created_at.clone(),
                },
            })
            .collect();

        let store = self.store.write().await;
        store.store_embeddings_batch(&records).await?;

        info!("Indexed {} chunks for document {}", records.len(), document_id);
        Ok(records.len())
    }

    /// The `k` chunks most similar to `query`, best first, with their similarity
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        let query_vector = self.embedder.embed(query).await?;

        let store = self.store.read().await;
        let results = store.search_similar(&query_vector, k).await?;

        Ok(results
            .into_iter()
            .map(|result| {
                let metadata = result.chunk_metadata;
                let chunk = Chunk {
                    content: metadata.content,
                    source: metadata.source,
                    page_number: metadata.page_number,
                    chunk_index: metadata.chunk_index as usize,
                };
                (chunk, result.similarity_score)
            })
            .collect())
    }

    /// Number of stored chunks
    #[inline]
    pub async fn len(&self) -> Result<u64> {
        self.store.read().await.count_embeddings().await
    }

    #[inline]
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    #[inline]
    pub async fn remove_document(&self, document_id: &str) -> Result<u64> {
        self.store
            .write()
            .await
            .delete_document_embeddings(document_id)
            .await
    }

    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.store.write().await.clear().await
    }
}
