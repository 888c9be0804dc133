// Generation module
// Chat model abstraction and the engine that streams its output over a channel


pub mod openai;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{ContractQaError, Result};

pub use openai::OpenAiCompatibleClient;
pub use stream::{AnswerStream, StreamEvent};

/// Fragments buffered between the producer thread and the consumer
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lazily produced answer fragments; pulling the next item may block on I/O
pub type FragmentIter = Box<dyn Iterator<Item = Result<String>> + Send>;

/// A chat model reachable through blocking calls
pub trait LanguageModel: Send + Sync {
    /// Full completion in one response
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Completion delivered fragment by fragment
    fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentIter>;

    fn name(&self) -> &str;
}

/// Runs a [`LanguageModel`] off the async runtime
#[derive(Clone)]
pub struct GenerationEngine {
    model: Arc<dyn LanguageModel>,
}

impl GenerationEngine {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Start streaming an answer on a dedicated producer thread
    ///
    /// The producer stops at its next send once the returned stream is dropped.
    #[inline]
    pub fn generate(&self, messages: Vec<ChatMessage>) -> Result<AnswerStream> {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let model = Arc::clone(&self.model);

        std::thread::Builder::new()
            .name("answer-producer".to_string())
            .spawn(move || produce(model.as_ref(), &messages, &sender))
            .map_err(|e| {
                ContractQaError::Generation(format!("failed to start answer producer: {e}"))
            })?;

        Ok(AnswerStream::new(receiver))
    }

    /// Non-streaming completion, run on the blocking pool
    #[inline]
    pub async fn generate_once(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || model.complete(&messages))
            .await
            .map_err(|e| ContractQaError::Generation(format!("generation task failed: {e}")))?
    }
}

fn produce(model: &dyn LanguageModel, messages: &[ChatMessage], sender: &mpsc::Sender<StreamEvent>) {
    debug!("Streaming answer from {}", model.name());

    let fragments = match model.stream(messages) {
        Ok(fragments) => fragments,
        Err(e) => {
            warn!("Generation failed to start: {}", e);
            // A closed channel means nobody is waiting for the error
            let _ = sender.blocking_send(StreamEvent::Failed(failure_message(e)));
            return;
        }
    };

    let mut count = 0_usize;
    for fragment in fragments {
        match fragment {
            Ok(text) => {
                if sender.blocking_send(StreamEvent::Fragment(text)).is_err() {
                    debug!("Answer stream dropped after {} fragments, stopping", count);
                    return;
                }
                count += 1;
            }
            Err(e) => {
                warn!("Generation failed after {} fragments: {}", count, e);
                let _ = sender.blocking_send(StreamEvent::Failed(failure_message(e)));
                return;
            }
        }
    }

    debug!("Generation completed with {} fragments", count);
    let _ = sender.blocking_send(StreamEvent::Completed);
}

fn failure_message(error: ContractQaError) -> String {
    match error {
        ContractQaError::Generation(message) => message,
        other => other.to_string(),
    }
}
