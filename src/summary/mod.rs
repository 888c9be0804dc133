
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::generation::GenerationEngine;
use crate::prompt::build_summary_messages;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 15_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SummaryConfig {
    /// Characters of document text sent to the model
    pub max_input_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

/// One-shot structured summaries of document text
#[derive(Clone)]
pub struct Summarizer {
    engine: GenerationEngine,
    max_input_chars: usize,
}

impl Summarizer {
    #[inline]
    pub fn new(engine: GenerationEngine, config: &SummaryConfig) -> Self {
        Self {
            engine,
            max_input_chars: config.max_input_chars,
        }
    }

    #[inline]
    pub async fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            debug!("Nothing to summarize");
            return Ok(String::new());
        }

        let input = truncate_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            info!(
                "Summarizing the first {} characters of a longer document",
                self.max_input_chars
            );
        }

        let summary = self
            .engine
            .generate_once(build_summary_messages(input))
            .await?;
        Ok(summary.trim().to_string())
    }
}

/// The first `max_chars` characters of `text`
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text.get(..cut).unwrap_or(text),
        None => text,
    }
}
