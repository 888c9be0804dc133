use clap::{Parser, Subcommand};
use contract_qa::commands::{
    ask_question, clear_corpus, evaluate_questions, ingest_file, list_documents, open_assistant,
    remove_document, run_chat, summarize_file,
};
use contract_qa::config::{get_data_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "contract-qa")]
#[command(about = "Ask cited questions about PDF and Word contracts")]
#[command(version)]
struct Cli {
    /// Directory holding the index, registry and config.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure the embedding server and chat model
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, index and summarize a PDF or DOCX contract
    Ingest {
        file: PathBuf,
    },
    /// Ask a single question about the ingested contracts
    Ask {
        question: String,
    },
    /// Start a multi-turn conversation
    Chat,
    /// Summarize a contract without adding it to the corpus
    Summarize {
        file: PathBuf,
    },
    /// Score answers against a JSON file of questions and expected snippets
    Eval {
        /// Array of {question, expected_answer_snippet, category?} objects
        file: PathBuf,
    },
    /// List ingested documents
    List,
    /// Remove a document and its passages
    Remove {
        /// Document ID as shown by `list`
        id: String,
    },
    /// Remove every document
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_data_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&data_dir)?;
            } else {
                run_interactive_config(&data_dir)?;
            }
        }
        Commands::Ingest { file } => {
            ingest_file(&open_assistant(&data_dir).await?, &file).await?;
        }
        Commands::Ask { question } => {
            ask_question(&open_assistant(&data_dir).await?, &question).await?;
        }
        Commands::Chat => {
            run_chat(&open_assistant(&data_dir).await?).await?;
        }
        Commands::Summarize { file } => {
            summarize_file(&open_assistant(&data_dir).await?, &file).await?;
        }
        Commands::Eval { file } => {
            evaluate_questions(&open_assistant(&data_dir).await?, &file).await?;
        }
        Commands::List => {
            list_documents(&open_assistant(&data_dir).await?).await?;
        }
        Commands::Remove { id } => {
            remove_document(&open_assistant(&data_dir).await?, &id).await?;
        }
        Commands::Clear { yes } => {
            clear_corpus(&open_assistant(&data_dir).await?, yes).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["contract-qa", "list"]).expect("list parses");
        assert!(matches!(cli.command, Commands::List));
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn ingest_command_with_file() {
        let cli = Cli::try_parse_from(["contract-qa", "ingest", "nda.pdf"]).expect("ingest parses");
        let Commands::Ingest { file } = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(file, PathBuf::from("nda.pdf"));
    }

    #[test]
    fn ask_command_with_question() {
        let cli = Cli::try_parse_from(["contract-qa", "ask", "What is the notice period?"])
            .expect("ask parses");
        let Commands::Ask { question } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(question, "What is the notice period?");
    }

    #[test]
    fn data_dir_is_global() {
        let cli = Cli::try_parse_from(["contract-qa", "chat", "--data-dir", "/tmp/corpus"])
            .expect("chat parses");
        assert!(matches!(cli.command, Commands::Chat));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/corpus")));
    }

    #[test]
    fn eval_command_with_file() {
        let cli = Cli::try_parse_from(["contract-qa", "eval", "tests/qa_pairs.json"])
            .expect("eval parses");
        let Commands::Eval { file } = cli.command else {
            panic!("expected eval");
        };
        assert_eq!(file, PathBuf::from("tests/qa_pairs.json"));
    }

    #[test]
    fn clear_yes_flag() {
        let cli = Cli::try_parse_from(["contract-qa", "clear", "--yes"]).expect("clear parses");
        assert!(matches!(cli.command, Commands::Clear { yes: true }));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["contract-qa", "config", "--show"]).expect("config parses");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn remove_requires_id() {
        let error = Cli::try_parse_from(["contract-qa", "remove"]).expect_err("id is required");
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn invalid_command() {
        let error = Cli::try_parse_from(["contract-qa", "invalid"]).expect_err("unknown command");
        assert_eq!(error.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn help_message() {
        let error = Cli::try_parse_from(["contract-qa", "--help"]).expect_err("help exits");
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
    }
}
