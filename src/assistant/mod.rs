// Assistant session
// Owns the corpus and exposes ingestion and question answering


mod query;

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{Database, DocumentRecord, NewDocument};
use crate::embeddings::{ChunkingConfig, Embedder, OllamaClient, chunk_pages};
use crate::generation::{GenerationEngine, LanguageModel, OpenAiCompatibleClient};
use crate::loader::{Page, load_document};
use crate::prompt::{Answer, Turn, build_qa_messages, format_context};
use crate::retrieval::{Retriever, VectorIndex};
use crate::summary::Summarizer;
use crate::{ContractQaError, Result};

pub use query::QueryStream;

/// Reply when a question arrives before any document was ingested
pub const EMPTY_CORPUS_MESSAGE: &str = "Please upload and process a document first.";

const NO_TEXT_STATUS: &str = "No readable text found in file.";
const NO_CHUNKS_STATUS: &str = "File processed but no meaningful chunks created.";

/// What the presentation layer shows after an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub status: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested {
        document: DocumentRecord,
        pages: usize,
        chunks: usize,
    },
    /// Nothing extractable, e.g. a scanned PDF
    NoReadableText { source: String },
    NoChunks { source: String, pages: usize },
}

impl IngestOutcome {
    #[inline]
    pub fn into_report(self) -> IngestReport {
        match self {
            Self::Ingested {
                document,
                pages,
                chunks,
            } => IngestReport {
                status: format!(
                    "Document processed successfully\n• Pages extracted: {pages}\n• Chunks created: {chunks}"
                ),
                summary: document.summary,
            },
            Self::NoReadableText { .. } => IngestReport {
                status: NO_TEXT_STATUS.to_string(),
                summary: String::new(),
            },
            Self::NoChunks { .. } => IngestReport {
                status: NO_CHUNKS_STATUS.to_string(),
                summary: String::new(),
            },
        }
    }
}

/// The single corpus and the pipeline that answers questions over it
pub struct ContractAssistant {
    chunking: ChunkingConfig,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    engine: GenerationEngine,
    summarizer: Summarizer,
    registry: Database,
}

impl ContractAssistant {
    /// Connect to the configured embedding server and chat model
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let embedder = OllamaClient::new(&config.ollama)
            .map_err(|e| ContractQaError::Config(format!("{e:#}")))?;
        let model = OpenAiCompatibleClient::new(&config.llm)
            .map_err(|e| ContractQaError::Config(format!("{e:#}")))?;

        Self::with_components(config, Arc::new(embedder), Arc::new(model)).await
    }

    /// Assemble a session from explicit backends
    #[inline]
    pub async fn with_components(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::open(&config.vector_database_path(), embedder).await?);
        let registry = Database::initialize(&config.database_path())
            .await
            .map_err(registry_error)?;
        let engine = GenerationEngine::new(model);

        info!(
            "Corpus at {} holds {} chunks; answering with {}",
            config.base_dir.display(),
            index.len().await?,
            engine.model_name()
        );

        Ok(Self {
            chunking: config.chunking.clone(),
            retriever: Retriever::new(Arc::clone(&index), &config.retrieval),
            summarizer: Summarizer::new(engine.clone(), &config.summary),
            index,
            engine,
            registry,
        })
    }

    /// Ingest a file, reporting the outcome as display strings
    #[inline]
    pub async fn ingest(&self, path: &Path) -> IngestReport {
        match self.ingest_document(path).await {
            Ok(outcome) => outcome.into_report(),
            Err(e) => {
                error!("Ingestion of {} failed: {}", path.display(), e);
                IngestReport {
                    status: format!("Processing failed: {e}"),
                    summary: String::new(),
                }
            }
        }
    }

    /// Load, chunk, index and summarize one document
    #[inline]
    pub async fn ingest_document(&self, path: &Path) -> Result<IngestOutcome> {
        info!("Ingesting {}", path.display());

        let owned_path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || load_document(&owned_path))
            .await
            .map_err(|e| ContractQaError::Extraction(format!("extraction task failed: {e}")))??;

        let source = file_name(path);
        if pages.is_empty() {
            warn!("{} contains no readable text", source);
            return Ok(IngestOutcome::NoReadableText { source });
        }

        let chunks = chunk_pages(&pages, &self.chunking);
        if chunks.is_empty() {
            warn!("{} produced no chunks from {} pages", source, pages.len());
            return Ok(IngestOutcome::NoChunks {
                source,
                pages: pages.len(),
            });
        }

        let existing = self
            .registry
            .find_documents_by_filename(&source)
            .await
            .map_err(registry_error)?;
        if !existing.is_empty() {
            warn!(
                "{} is already in the corpus {} time(s); its chunks will be indexed again",
                source,
                existing.len()
            );
        }

        let document_id = Uuid::new_v4().to_string();
        let indexed = self.index.add(&document_id, &chunks).await?;

        let summary = match self.summarizer.summarize(&full_text(&pages)).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary of {} failed, continuing without one: {}", source, e);
                String::new()
            }
        };

        let new_document = NewDocument {
            id: document_id.clone(),
            filename: source.clone(),
            path: path.display().to_string(),
            page_count: i64::try_from(pages.len()).unwrap_or(i64::MAX),
            chunk_count: i64::try_from(indexed).unwrap_or(i64::MAX),
            summary,
        };

        let document = match self.registry.insert_document(&new_document).await {
            Ok(document) => document,
            Err(e) => {
                // Keep index and registry in step
                self.index.remove_document(&document_id).await?;
                return Err(registry_error(e));
            }
        };

        info!(
            "Ingested {}: {} pages, {} chunks",
            source,
            pages.len(),
            indexed
        );
        Ok(IngestOutcome::Ingested {
            document,
            pages: pages.len(),
            chunks: indexed,
        })
    }

    /// Stream progressively longer versions of the answer
    ///
    /// Nothing runs until the stream is polled. Failures end the stream with an
    /// inline error message instead of an error item.
    #[inline]
    pub fn ask(&self, question: &str, history: &[Turn]) -> QueryStream {
        info!("Question: {}", question);

        QueryStream::start(
            Arc::clone(&self.index),
            self.retriever.clone(),
            self.engine.clone(),
            question.to_string(),
            history.to_vec(),
        )
    }

    /// Whole answer with its citations resolved
    ///
    /// A generation failure after some text arrived is appended to that text
    /// instead of discarding it; a failure before any text is an error.
    #[inline]
    pub async fn answer(&self, question: &str, history: &[Turn]) -> Result<Answer> {
        if self.index.is_empty().await? {
            return Ok(Answer::PlainText(EMPTY_CORPUS_MESSAGE.to_string()));
        }

        let retrieved = self.retriever.retrieve(question).await?;
        let context = format_context(&retrieved);
        let messages = build_qa_messages(&context, history, question);

        let mut stream = self.engine.generate(messages)?;
        let mut text = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            match fragment {
                Ok(fragment) => text.push_str(&fragment),
                Err(e) if text.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Answer generation failed after {} chars: {}", text.len(), e);
                    text = format!("{text}\n\n{e}");
                    break;
                }
            }
        }

        Ok(Answer::from_generated(text, &context))
    }

    /// Summarize a file without adding it to the corpus
    #[inline]
    pub async fn summarize_file(&self, path: &Path) -> Result<String> {
        let owned_path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || load_document(&owned_path))
            .await
            .map_err(|e| ContractQaError::Extraction(format!("extraction task failed: {e}")))??;

        debug!("Summarizing {} pages of {}", pages.len(), path.display());
        self.summarizer.summarize(&full_text(&pages)).await
    }

    #[inline]
    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.registry.list_documents().await.map_err(registry_error)
    }

    /// Drop a document and all of its chunks; `false` when the id is unknown
    #[inline]
    pub async fn remove_document(&self, id: &str) -> Result<bool> {
        let removed_chunks = self.index.remove_document(id).await?;
        let removed = self
            .registry
            .delete_document(id)
            .await
            .map_err(registry_error)?;

        info!("Removed document {} ({} chunks)", id, removed_chunks);
        Ok(removed || removed_chunks > 0)
    }

    /// Reset the corpus to empty
    #[inline]
    pub async fn clear_corpus(&self) -> Result<()> {
        self.index.clear().await?;
        let removed = self
            .registry
            .clear_documents()
            .await
            .map_err(registry_error)?;

        info!("Cleared corpus ({} documents)", removed);
        Ok(())
    }

    /// Chunks currently stored
    #[inline]
    pub async fn chunk_count(&self) -> Result<u64> {
        self.index.len().await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn full_text(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|page| page.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn registry_error(error: anyhow::Error) -> ContractQaError {
    ContractQaError::Database(format!("{error:#}"))
}
