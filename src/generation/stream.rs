use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::{ContractQaError, Result};

/// What the producer thread reports to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Completed,
    Failed(String),
}

/// Receiving end of a streamed answer
///
/// Yields fragments in order. A failure, or a producer that vanishes without
/// reporting completion, surfaces as one `Generation` error and ends the stream.
pub struct AnswerStream {
    receiver: mpsc::Receiver<StreamEvent>,
    finished: bool,
}

impl AnswerStream {
    pub(crate) fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            receiver,
            finished: false,
        }
    }

    /// Next fragment, or `None` once the answer is complete
    #[inline]
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }
        let event = self.receiver.recv().await;
        self.settle(event)
    }

    /// Wait for the whole answer
    #[inline]
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    /// Wait for the whole answer from outside the async runtime
    #[inline]
    pub fn blocking_collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while !self.finished {
            let event = self.receiver.blocking_recv();
            if let Some(fragment) = self.settle(event) {
                text.push_str(&fragment?);
            }
        }
        Ok(text)
    }

    fn settle(&mut self, event: Option<StreamEvent>) -> Option<Result<String>> {
        match event {
            Some(StreamEvent::Fragment(text)) => Some(Ok(text)),
            Some(StreamEvent::Completed) => {
                self.finished = true;
                None
            }
            Some(StreamEvent::Failed(message)) => {
                self.finished = true;
                Some(Err(ContractQaError::Generation(message)))
            }
            None => {
                self.finished = true;
                Some(Err(ContractQaError::Generation(
                    "answer stream closed before completion".to_string(),
                )))
            }
        }
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    #[inline]
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(event) => Poll::Ready(this.settle(event)),
            Poll::Pending => Poll::Pending,
        }
    }
}
