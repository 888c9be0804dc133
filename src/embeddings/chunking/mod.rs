#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::loader::Page;

/// A passage of a page, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The passage text, whitespace-trimmed
    pub content: String,
    /// File name of the originating document
    pub source: String,
    /// 1-based page number inherited from the page
    pub page_number: u32,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

/// Configuration for recursive character splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,
    /// Separators in priority order
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            separators: ["\n\n", "\n", ". ", " ", "Clause ", "Section ", "Article "]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Chunk every page of a document, keeping page metadata on each chunk
#[inline]
pub fn chunk_pages(pages: &[Page], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for content in split_text(&page.content, config) {
            chunks.push(Chunk {
                content,
                source: page.source.clone(),
                page_number: page.page_number,
                chunk_index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| char_len(&c.content)).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split text into trimmed, overlapping chunks of at most `chunk_size` characters
///
/// A piece with no separator inside the bound is emitted whole, so such a
/// chunk may exceed `chunk_size`.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = split_recursive(text, &config.separators, config);
    // Drop punctuation-only leftovers between cuts
    chunks.retain(|chunk| chunk.chars().any(char::is_alphanumeric));
    chunks
}

fn split_recursive(text: &str, separators: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();

    // Fall back to the last separator when none occurs in the text
    let (separator, remaining) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
        .map_or_else(
            || (separators.last().map_or("", String::as_str), &[][..]),
            |idx| {
                (
                    separators[idx].as_str(),
                    separators.get(idx + 1..).unwrap_or_default(),
                )
            },
        );

    let mut good_splits: Vec<String> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(&piece) < config.chunk_size {
            good_splits.push(piece);
            continue;
        }

        if !good_splits.is_empty() {
            chunks.extend(merge_splits(&good_splits, config));
            good_splits.clear();
        }

        if remaining.is_empty() {
            let overflow = piece.trim();
            if !overflow.is_empty() {
                warn!(
                    "No separator inside a {}-character span; emitting an oversized chunk",
                    char_len(overflow)
                );
                chunks.push(overflow.to_string());
            }
        } else {
            chunks.extend(split_recursive(&piece, remaining, config));
        }
    }

    if !good_splits.is_empty() {
        chunks.extend(merge_splits(&good_splits, config));
    }

    chunks
}

/// Split on `separator`, keeping it at the start of the piece that follows
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = text.split(separator);
    let mut result = Vec::new();

    if let Some(first) = pieces.next() {
        result.push(first.to_string());
    }
    result.extend(pieces.map(|piece| format!("{separator}{piece}")));

    result.retain(|piece| !piece.is_empty());
    result
}

/// Greedily merge small pieces into chunks, carrying trailing pieces forward as overlap
fn merge_splits(splits: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for split in splits {
        let len = char_len(split);

        if total + len > config.chunk_size && !current.is_empty() {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    total, config.chunk_size
                );
            }

            push_joined(&mut chunks, &current);

            while total > config.chunk_overlap
                || (total + len > config.chunk_size && total > 0)
            {
                match current.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        current.push_back(split);
        total += len;
    }

    push_joined(&mut chunks, &current);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined = pieces.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
