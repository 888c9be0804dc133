use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tracing::{debug, warn};

use super::EMPTY_CORPUS_MESSAGE;
use crate::generation::{AnswerStream, GenerationEngine};
use crate::prompt::{Turn, build_qa_messages, format_context};
use crate::retrieval::{Retriever, VectorIndex};

/// Progressively complete answer strings; the last item is the final answer
pub struct QueryStream {
    inner: BoxStream<'static, String>,
    completed: Arc<AtomicBool>,
}

struct Pending {
    index: Arc<VectorIndex>,
    retriever: Retriever,
    engine: GenerationEngine,
    question: String,
    history: Vec<Turn>,
    completed: Arc<AtomicBool>,
}

enum State {
    Pending(Box<Pending>),
    Streaming {
        answer: AnswerStream,
        text: String,
        completed: Arc<AtomicBool>,
    },
    Done,
}

impl QueryStream {
    pub(super) fn start(
        index: Arc<VectorIndex>,
        retriever: Retriever,
        engine: GenerationEngine,
        question: String,
        history: Vec<Turn>,
    ) -> Self {
        let completed = Arc::new(AtomicBool::new(false));
        let pending = Pending {
            index,
            retriever,
            engine,
            question,
            history,
            completed: Arc::clone(&completed),
        };

        Self {
            inner: stream::unfold(State::Pending(Box::new(pending)), step).boxed(),
            completed,
        }
    }

    /// Whether the model finished its answer
    ///
    /// Stays `false` for the empty-corpus reply, inline errors and streams
    /// dropped early.
    #[inline]
    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Drain the stream, keeping only the final answer
    #[inline]
    pub async fn final_answer(self) -> String {
        self.fold(String::new(), |_, latest| async move { latest })
            .await
    }
}

impl Stream for QueryStream {
    type Item = String;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

async fn step(state: State) -> Option<(String, State)> {
    match state {
        State::Pending(pending) => begin(*pending).await,
        State::Streaming {
            answer,
            text,
            completed,
        } => advance(answer, text, completed).await,
        State::Done => None,
    }
}

async fn begin(pending: Pending) -> Option<(String, State)> {
    match pending.index.is_empty().await {
        Ok(true) => {
            debug!("Corpus is empty, not searching");
            return Some((EMPTY_CORPUS_MESSAGE.to_string(), State::Done));
        }
        Ok(false) => {}
        Err(e) => return Some((e.to_string(), State::Done)),
    }

    let retrieved = match pending.retriever.retrieve(&pending.question).await {
        Ok(retrieved) => retrieved,
        Err(e) => {
            warn!("Retrieval failed: {}", e);
            return Some((e.to_string(), State::Done));
        }
    };

    let context = format_context(&retrieved);
    let messages = build_qa_messages(&context, &pending.history, &pending.question);

    match pending.engine.generate(messages) {
        Ok(answer) => advance(answer, String::new(), pending.completed).await,
        Err(e) => Some((e.to_string(), State::Done)),
    }
}

async fn advance(
    mut answer: AnswerStream,
    mut text: String,
    completed: Arc<AtomicBool>,
) -> Option<(String, State)> {
    match answer.next_fragment().await {
        Some(Ok(fragment)) => {
            text.push_str(&fragment);
            Some((
                text.clone(),
                State::Streaming {
                    answer,
                    text,
                    completed,
                },
            ))
        }
        Some(Err(e)) => {
            warn!("Answer generation failed: {}", e);
            let message = if text.is_empty() {
                e.to_string()
            } else {
                format!("{text}\n\n{e}")
            };
            Some((message, State::Done))
        }
        None => {
            completed.store(true, Ordering::Release);
            // An empty answer still yields one item
            text.is_empty().then_some((text, State::Done))
        }
    }
}
