// Prompt assembly
// Numbers retrieved chunks into a citable context block and builds chat prompts


use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::generation::ChatMessage;
use crate::retrieval::RetrievedChunk;

const QA_INSTRUCTIONS: &str = "\
You are a careful contract analysis assistant.
Answer ONLY from the numbered context excerpts below.
Cite excerpts inline with their bracket numbers exactly as shown, e.g. [1] or [2].
End your answer with a list of the sources you used, if any.";

const QA_GUARDRAILS: &str = "\
If the excerpts answer the question only partly or not at all, say so. \
Share whatever related information the excerpts do contain and clearly mark what is uncertain.

Do not guess, do not invent facts, and do not give legal advice.";

const SUMMARY_INSTRUCTIONS: &str = "\
Write a concise, structured summary of the contract text below.
Cover the parties involved, the purpose, key obligations, duration, termination and confidentiality.
Use bullet points.";

static CITATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Assistant,
}

/// One exchange of the conversation so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Where a bracket number in the context points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub source: String,
    pub page_number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    /// `citations[i].index == i + 1`
    pub citations: Vec<Citation>,
}

impl ContextBlock {
    #[inline]
    pub fn citation(&self, index: usize) -> Option<&Citation> {
        index
            .checked_sub(1)
            .and_then(|position| self.citations.get(position))
    }
}

/// A finished answer, with resolved citations when it cites anything valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    PlainText(String),
    Structured {
        text: String,
        citations: Vec<Citation>,
    },
}

impl Answer {
    /// Resolve the bracket citations of a generated answer against its context
    ///
    /// Numbers outside the context are dropped and logged.
    #[inline]
    pub fn from_generated(text: String, context: &ContextBlock) -> Self {
        let mut citations = Vec::new();
        for index in cited_indices(&text) {
            match context.citation(index) {
                Some(citation) => citations.push(citation.clone()),
                None => warn!(
                    "Answer cites [{}] but only {} excerpts were provided",
                    index,
                    context.citations.len()
                ),
            }
        }

        if citations.is_empty() {
            Self::PlainText(text)
        } else {
            Self::Structured { text, citations }
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        match self {
            Self::PlainText(text) | Self::Structured { text, .. } => text,
        }
    }

    #[inline]
    pub fn citations(&self) -> &[Citation] {
        match self {
            Self::PlainText(_) => &[],
            Self::Structured { citations, .. } => citations,
        }
    }
}

/// Render retrieved chunks as numbered excerpts, 1 for the best match
#[inline]
pub fn format_context(chunks: &[RetrievedChunk]) -> ContextBlock {
    let mut excerpts = Vec::with_capacity(chunks.len());
    let mut citations = Vec::with_capacity(chunks.len());

    for (position, retrieved) in chunks.iter().enumerate() {
        let index = position + 1;
        let chunk = &retrieved.chunk;
        excerpts.push(format!(
            "[{}] {}\n(source: {}, page: {})",
            index,
            chunk.content.trim(),
            chunk.source,
            chunk.page_number
        ));
        citations.push(Citation {
            index,
            source: chunk.source.clone(),
            page_number: chunk.page_number,
        });
    }

    ContextBlock {
        text: excerpts.join("\n\n"),
        citations,
    }
}

/// System instructions with the context, then the history, then the question
#[inline]
pub fn build_qa_messages(
    context: &ContextBlock,
    history: &[Turn],
    question: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{QA_INSTRUCTIONS}\n\nContext excerpts:\n{}\n\n{QA_GUARDRAILS}",
        context.text
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().map(|turn| match turn.speaker {
        Speaker::User => ChatMessage::user(turn.text.clone()),
        Speaker::Assistant => ChatMessage::assistant(turn.text.clone()),
    }));
    messages.push(ChatMessage::user(question));

    debug!(
        "Built prompt with {} excerpts and {} history turns",
        context.citations.len(),
        history.len()
    );
    messages
}

#[inline]
pub fn build_summary_messages(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "{SUMMARY_INSTRUCTIONS}\n\nText:\n{text}"
    ))]
}

/// Citation numbers in order of first appearance; `[2, 3]` yields both
#[inline]
pub fn cited_indices(answer: &str) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut indices = Vec::new();

    for captures in CITATION_REGEX.captures_iter(answer).flatten() {
        let Some(group) = captures.get(1) else {
            continue;
        };
        let numbers = group
            .as_str()
            .split(',')
            .filter_map(|number| number.trim().parse::<usize>().ok());
        for index in numbers {
            if seen.insert(index) {
                indices.push(index);
            }
        }
    }

    indices
}
