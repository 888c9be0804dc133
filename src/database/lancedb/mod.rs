// LanceDB vector database module
// Stores chunk embeddings and runs similarity search over them


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The vector embedding; its length must match the table dimension
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// ID of the document in the corpus registry
    pub document_id: String,
    /// File name of the source document
    pub source: String,
    /// 1-based page the chunk was cut from
    pub page_number: u32,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// The actual text content of the chunk
    pub content: String,
    /// RFC 3339 timestamp when this embedding was created
    pub created_at: String,
}
