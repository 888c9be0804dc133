// Retrieval module
// Persistent chunk index and the top-k retriever the query path runs on


pub mod index;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::embeddings::Chunk;
use crate::{ContractQaError, Result};

pub use index::VectorIndex;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks handed to the prompt per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// A chunk returned for one query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// 1 is the best match
    pub rank: usize,
    pub score: f32,
}

#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    top_k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(index: Arc<VectorIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            top_k: config.top_k.max(1),
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-k chunks for `question`, ranked from 1
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let hits = self
            .index
            .search(question, self.top_k)
            .await
            .map_err(|e| ContractQaError::Retrieval(e.to_string()))?;

        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, score))| RetrievedChunk {
                chunk,
                rank: i + 1,
                score,
            })
            .collect();

        debug!("Retrieved {} chunks for question", retrieved.len());
        for hit in &retrieved {
            debug!(
                "  [{}] {} p.{} score={:.3}: {}",
                hit.rank,
                hit.chunk.source,
                hit.chunk.page_number,
                hit.score,
                preview(&hit.chunk.content, 80)
            );
        }

        Ok(retrieved)
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
