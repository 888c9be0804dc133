use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::assistant::{ContractAssistant, QueryStream};
use crate::config::Config;
use crate::evaluation::{EvalCase, evaluate, load_qa_pairs};
use crate::prompt::Turn;

/// Load the configuration in `data_dir` and start a session over its corpus
#[inline]
pub async fn open_assistant(data_dir: &Path) -> Result<ContractAssistant> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration is invalid; run `contract-qa config`")?;

    ContractAssistant::new(&config)
        .await
        .context("Failed to open the document corpus")
}

/// Ingest a contract and print the status and summary
#[inline]
pub async fn ingest_file(assistant: &ContractAssistant, path: &Path) -> Result<()> {
    let bar = spinner(&format!("Processing {}", path.display()));
    let report = assistant.ingest(path).await;
    bar.finish_and_clear();

    println!("{}", report.status);
    if !report.summary.is_empty() {
        println!();
        println!("{}", style("Summary").bold().cyan());
        println!("{}", report.summary);
    }

    Ok(())
}

/// Answer one question, printing the answer as it streams in
#[inline]
pub async fn ask_question(assistant: &ContractAssistant, question: &str) -> Result<()> {
    render_answer(&mut assistant.ask(question, &[])).await?;
    Ok(())
}

/// Interactive multi-turn conversation over the corpus
#[inline]
pub async fn run_chat(assistant: &ContractAssistant) -> Result<()> {
    eprintln!(
        "{}",
        style("Ask questions about your contracts. /clear resets the conversation, /quit exits.")
            .dim()
    );

    let mut history: Vec<Turn> = Vec::new();

    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();

        match question {
            "" => {}
            "/quit" | "/exit" => break,
            "/clear" => {
                history.clear();
                eprintln!("{}", style("Conversation cleared.").dim());
            }
            _ => {
                print!("{} ", style("Assistant:").bold().green());
                let mut answers = assistant.ask(question, &history);
                let answer = render_answer(&mut answers).await?;
                remember_exchange(&mut history, question, answer, answers.completed());
            }
        }
    }

    Ok(())
}

/// Run every question in a `qa_pairs.json` file and print hit and citation rates
#[inline]
pub async fn evaluate_questions(assistant: &ContractAssistant, path: &Path) -> Result<()> {
    let pairs = load_qa_pairs(path)?;
    println!("Loaded {} evaluation questions.", pairs.len());
    println!();

    let bar = spinner("Answering evaluation questions");
    let report = evaluate(assistant, &pairs).await;
    bar.finish_and_clear();

    let total = report.total();
    for (position, case) in report.cases.iter().enumerate() {
        println!("[{:2}/{}]  {}", position + 1, total, case.question);
        println!(
            "      {}  expected snippet    {}  citation",
            mark(case.contains_expected),
            mark(case.has_citation)
        );
        if let Some(error) = &case.error {
            println!("      {} {error}", style("ERROR:").red());
        } else if !case.contains_expected {
            println!("      Answer excerpt: {} …", excerpt(case));
        }
        println!();
    }

    if total > 0 {
        let rule = "─".repeat(70);
        println!("{rule}");
        println!(
            "Success rate (expected snippet present): {:.1}%   ({}/{})",
            report.success_rate() * 100.0,
            report.success_count(),
            total
        );
        println!(
            "Citation rate:                           {:.1}%   ({}/{})",
            report.citation_rate() * 100.0,
            report.citation_count(),
            total
        );
        println!("{rule}");
    }

    Ok(())
}

fn mark(passed: bool) -> console::StyledObject<&'static str> {
    if passed {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

/// First 220 characters of an answer on one line
fn excerpt(case: &EvalCase) -> String {
    case.answer
        .chars()
        .take(220)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Print a structured summary of a file without indexing it
#[inline]
pub async fn summarize_file(assistant: &ContractAssistant, path: &Path) -> Result<()> {
    let bar = spinner(&format!("Summarizing {}", path.display()));
    let summary = assistant.summarize_file(path).await;
    bar.finish_and_clear();

    let summary = summary.with_context(|| format!("Failed to summarize {}", path.display()))?;
    if summary.is_empty() {
        println!("No readable text found in file.");
    } else {
        println!("{summary}");
    }
    Ok(())
}

#[inline]
pub async fn list_documents(assistant: &ContractAssistant) -> Result<()> {
    let documents = assistant.documents().await?;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'contract-qa ingest <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {} (ID: {})", style(&document.filename).bold(), document.id);
        println!("   Path: {}", document.path);
        println!(
            "   Pages: {}, Chunks: {}",
            document.page_count, document.chunk_count
        );
        println!(
            "   Ingested: {}",
            document.ingested_at.format("%Y-%m-%d %H:%M:%S")
        );
        let preview = document.summary_preview(100);
        if !preview.is_empty() {
            println!("   Summary: {preview}");
        }
        println!();
    }

    println!("Indexed chunks: {}", assistant.chunk_count().await?);
    Ok(())
}

#[inline]
pub async fn remove_document(assistant: &ContractAssistant, id: &str) -> Result<()> {
    if assistant.remove_document(id).await? {
        println!("✓ Removed document {id}");
    } else {
        println!("Document not found: {id}");
    }
    Ok(())
}

/// Delete every document and chunk, asking first unless `yes`
#[inline]
pub async fn clear_corpus(assistant: &ContractAssistant, yes: bool) -> Result<()> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt("Delete every ingested document? This cannot be undone.")
            .default(false)
            .interact()?;

    if !confirmed {
        println!("Nothing deleted.");
        return Ok(());
    }

    assistant.clear_corpus().await?;
    info!("Corpus cleared from the command line");
    println!("✓ Corpus cleared");
    Ok(())
}

/// Keep a question and its answer as context for later turns
///
/// Error text and the empty-corpus reply were never said by the model, so
/// exchanges that did not complete leave the history untouched.
fn remember_exchange(history: &mut Vec<Turn>, question: &str, answer: String, completed: bool) {
    if !completed || answer.trim().is_empty() {
        return;
    }
    history.push(Turn::user(question));
    history.push(Turn::assistant(answer));
}

/// Print each new part of a streamed answer; returns the final answer
async fn render_answer(answers: &mut QueryStream) -> Result<String> {
    let mut stdout = std::io::stdout();
    let mut shown = String::new();

    while let Some(latest) = answers.next().await {
        match new_suffix(&shown, &latest) {
            Some(suffix) => print!("{suffix}"),
            None => print!("\n{latest}"),
        }
        stdout.flush().context("Failed to write answer")?;
        shown = latest;
    }
    println!();

    Ok(shown)
}

/// The part of `latest` not printed yet, if it extends what was shown
fn new_suffix<'a>(shown: &str, latest: &'a str) -> Option<&'a str> {
    latest.strip_prefix(shown)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_of_growing_answer() {
        assert_eq!(new_suffix("", "The fees"), Some("The fees"));
        assert_eq!(new_suffix("The fees", "The fees are due"), Some(" are due"));
        assert_eq!(new_suffix("The fees", "The fees"), Some(""));
    }

    #[test]
    fn rewritten_answer_has_no_suffix() {
        assert_eq!(new_suffix("The fees are", "Error"), None);
    }

    #[test]
    fn excerpt_is_single_line_and_bounded() {
        let case = EvalCase {
            question: "Term?".to_string(),
            category: None,
            answer: format!("Line one\r\nline two {}", "x".repeat(300)),
            contains_expected: false,
            has_citation: false,
            error: None,
        };

        let text = excerpt(&case);
        assert!(text.starts_with("Line one  line two"));
        assert_eq!(text.chars().count(), 220);
        assert!(!text.contains('\n'));
    }

    #[test]
    fn completed_exchange_is_remembered() {
        let mut history = Vec::new();
        remember_exchange(&mut history, "Who pays?", "Acme Corp [1].".to_string(), true);

        assert_eq!(history, vec![Turn::user("Who pays?"), Turn::assistant("Acme Corp [1].")]);
    }

    #[test]
    fn failed_or_empty_exchange_is_forgotten() {
        let mut history = vec![Turn::user("Who pays?"), Turn::assistant("Acme Corp [1].")];

        remember_exchange(
            &mut history,
            "When?",
            "Thirty days\n\nGeneration error: model unavailable".to_string(),
            false,
        );
        remember_exchange(
            &mut history,
            "Anything?",
            "Please upload and process a document first.".to_string(),
            false,
        );
        remember_exchange(&mut history, "Silence?", "  ".to_string(), true);

        assert_eq!(history.len(), 2);
    }
}
