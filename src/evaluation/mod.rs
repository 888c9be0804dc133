// Answer quality evaluation
// Replays known questions against the corpus and scores the answers


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::assistant::ContractAssistant;
use crate::prompt::{Answer, cited_indices};

/// One question with a snippet its answer is expected to contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub expected_answer_snippet: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Read a JSON array of question/answer pairs
#[inline]
pub fn load_qa_pairs(path: &Path) -> Result<Vec<QaPair>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse question/answer pairs in {}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCase {
    pub question: String,
    pub category: Option<String>,
    pub answer: String,
    /// Expected snippet found, ignoring case
    pub contains_expected: bool,
    /// Answer carries at least one `[n]` citation
    pub has_citation: bool,
    /// Set when no answer could be produced
    pub error: Option<String>,
}

impl EvalCase {
    /// Score a produced answer against its pair
    #[inline]
    pub fn scored(pair: &QaPair, answer: &Answer) -> Self {
        let text = answer.text();
        Self {
            question: pair.question.clone(),
            category: pair.category.clone(),
            answer: text.to_string(),
            contains_expected: text
                .to_lowercase()
                .contains(&pair.expected_answer_snippet.to_lowercase()),
            has_citation: !cited_indices(text).is_empty(),
            error: None,
        }
    }

    #[inline]
    pub fn failed(pair: &QaPair, error: String) -> Self {
        Self {
            question: pair.question.clone(),
            category: pair.category.clone(),
            answer: String::new(),
            contains_expected: false,
            has_citation: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    pub cases: Vec<EvalCase>,
}

impl EvalReport {
    #[inline]
    pub fn total(&self) -> usize {
        self.cases.len()
    }

    #[inline]
    pub fn success_count(&self) -> usize {
        self.cases.iter().filter(|c| c.contains_expected).count()
    }

    #[inline]
    pub fn citation_count(&self) -> usize {
        self.cases.iter().filter(|c| c.has_citation).count()
    }

    /// Share of answers containing their expected snippet, 0.0 when empty
    #[inline]
    pub fn success_rate(&self) -> f64 {
        rate(self.success_count(), self.total())
    }

    #[inline]
    pub fn citation_rate(&self) -> f64 {
        rate(self.citation_count(), self.total())
    }
}

/// Ask every question with an empty history and score the answers
///
/// A failed question is recorded as a miss; the run continues.
#[inline]
pub async fn evaluate(assistant: &ContractAssistant, pairs: &[QaPair]) -> EvalReport {
    let mut report = EvalReport::default();

    for (position, pair) in pairs.iter().enumerate() {
        info!(
            "Evaluating question {}/{}: {}",
            position + 1,
            pairs.len(),
            pair.question
        );

        let case = match assistant.answer(&pair.question, &[]).await {
            Ok(answer) => EvalCase::scored(pair, &answer),
            Err(e) => {
                warn!("Question {} failed: {}", position + 1, e);
                EvalCase::failed(pair, e.to_string())
            }
        };
        report.cases.push(case);
    }

    info!(
        "Evaluation finished: {}/{} expected, {}/{} cited",
        report.success_count(),
        report.total(),
        report.citation_count(),
        report.total()
    );
    report
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}
