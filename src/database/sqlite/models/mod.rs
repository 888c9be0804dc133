#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A document that has been ingested into the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub summary: String,
    pub ingested_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Generated by the caller so vectors can reference it before the row exists
    pub id: String,
    pub filename: String,
    pub path: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub summary: String,
}

impl DocumentRecord {
    /// Summary text suitable for a single-line listing
    #[inline]
    pub fn summary_preview(&self, max_chars: usize) -> String {
        let first_line = self
            .summary
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        if first_line.chars().count() <= max_chars {
            first_line.to_string()
        } else {
            let truncated: String = first_line.chars().take(max_chars).collect();
            format!("{}…", truncated.trim_end())
        }
    }
}
