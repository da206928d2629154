//! # VidyaSetu CLI (`vidyasetu`)
//!
//! Chat with a tutor grounded in your PDF textbooks, from the terminal or a
//! browser.
//!
//! ## Usage
//!
//! ```bash
//! vidyasetu --config ./config/vidyasetu.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vidyasetu chat` | Interactive terminal chat |
//! | `vidyasetu ask "<question>"` | Answer one question and exit |
//! | `vidyasetu search "<query>"` | Show retrieved excerpts without asking the model |
//! | `vidyasetu serve` | Start the web chat |
//! | `vidyasetu index build` | Ingest the source directory and write the index |
//! | `vidyasetu index info` | Describe the persisted index |
//!
//! `OPENAI_API_KEY` must be set (a `.env` file in the working directory is
//! read first). Diagnostics go to stderr, filtered by `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use vidyasetu::{config, index_cmd, logging, search, server, shell, tutor::Tutor};

/// VidyaSetu: a conversational tutor over your PDF textbooks.
#[derive(Parser)]
#[command(
    name = "vidyasetu",
    about = "VidyaSetu: a conversational tutor over your PDF textbooks",
    version,
    long_about = "VidyaSetu ingests a directory of PDF textbooks into a vector index and answers \
    questions about them with cited excerpts, in a terminal chat or a browser."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/vidyasetu.toml`. If the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/vidyasetu.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the tutor in the terminal.
    ///
    /// Type `exit` or `quit` (or send EOF) to leave.
    Chat {
        /// Print the retrieved sources before each answer.
        #[arg(long)]
        show_sources: bool,
    },

    /// Ask a single question and print the answer.
    Ask {
        question: String,

        /// Print the retrieved sources after the answer.
        #[arg(long)]
        show_sources: bool,
    },

    /// Print the excerpts retrieved for a query.
    Search {
        query: String,

        /// Number of excerpts (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the web chat server on `[server].bind`.
    Serve,

    /// Manage the persisted vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Ingest `paths.source_dir` and write the index.
    Build {
        /// Replace an existing index.
        #[arg(long)]
        force: bool,
    },
    /// Show index metadata and per-book chunk counts.
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    // Nothing starts without the credential.
    config::require_api_key()?;
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chat { show_sources } => {
            let tutor = Tutor::from_config(&cfg).await?;
            let mut conversation =
                vidyasetu::conversation::create_conversation(&cfg.conversation.strategy)?;
            let stdin = io::stdin();
            shell::run_repl(
                &tutor,
                conversation.as_mut(),
                stdin.lock(),
                io::stdout(),
                show_sources,
            )
            .await?;
        }
        Commands::Ask {
            question,
            show_sources,
        } => {
            let tutor = Tutor::from_config(&cfg).await?;
            let mut conversation =
                vidyasetu::conversation::create_conversation(&cfg.conversation.strategy)?;
            let reply = tutor.ask(conversation.as_mut(), &question).await;
            println!("{}", reply.text);
            if show_sources && !reply.context.is_empty() {
                println!();
                println!("--- Sources ---");
                println!("{}", reply.context);
            }
        }
        Commands::Search { query, limit } => {
            let tutor = Tutor::from_config(&cfg).await?;
            let limit = limit.unwrap_or(cfg.retrieval.top_k);
            search::run_search(&tutor, &query, limit).await?;
        }
        Commands::Serve => {
            let tutor = Tutor::from_config(&cfg).await?;
            server::run_server(&cfg, Arc::new(tutor)).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Build { force } => {
                index_cmd::run_build(&cfg, force).await?;
            }
            IndexAction::Info => {
                index_cmd::run_info(&cfg).await?;
            }
        },
    }

    Ok(())
}
