use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContractQaError>;

#[derive(Error, Debug)]
pub enum ContractQaError {
    #[error("Unsupported file type: {0}. Use PDF or DOCX.")]
    UnsupportedFileType(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod evaluation;
pub mod generation;
pub mod loader;
pub mod prompt;
pub mod retrieval;
pub mod summary;

#[cfg(test)]
mod test_support;
