//! # PDF-QA CLI (`pdfqa`)
//!
//! The `pdfqa` binary is the primary interface for PDF-QA. It provides
//! commands for database initialization, PDF ingestion, per-document
//! question answering, and index management.
//!
//! ## Usage
//!
//! ```bash
//! pdfqa --config ./config/pdfqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfqa init` | Create the SQLite database and run schema migrations |
//! | `pdfqa ingest <file.pdf>` | Store a PDF, extract its text, and build its index |
//! | `pdfqa ask <id> "<question>"` | Answer a question against one document |
//! | `pdfqa status <id>` | Show a document's metadata and indexing status |
//! | `pdfqa list` | List all documents |
//! | `pdfqa reindex <id>` | Rebuild a document's index from its stored file |
//! | `pdfqa delete <id>` | Delete a document, its file, and its index |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! pdfqa init --config ./config/pdfqa.toml
//!
//! # Ingest a PDF with a human-readable title
//! pdfqa ingest reports/q3.pdf --title "Q3 Report" --config ./config/pdfqa.toml
//!
//! # Ask a question against that document
//! pdfqa ask 1f0c... "What was revenue growth?" --config ./config/pdfqa.toml
//!
//! # Check indexing status
//! pdfqa status 1f0c... --config ./config/pdfqa.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pdf_qa::{config, db, get, ingest, migrate, qa};

/// PDF-QA CLI — ask questions about your PDFs, grounded in their content.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pdfqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pdfqa",
    about = "PDF-QA — ask questions about your PDFs, grounded in their content",
    version,
    long_about = "PDF-QA ingests PDF documents, chunks and embeds their text into a \
    per-document vector index stored in SQLite, and answers questions by retrieving \
    the most relevant excerpts and asking the configured language model for an \
    answer grounded in them."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pdfqa.toml`. Database, storage, chunking,
    /// retrieval, and provider settings are read from this file.
    #[arg(long, global = true, default_value = "./config/pdfqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, indexes, index_entries). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest a PDF document.
    ///
    /// Copies the file into the documents directory, extracts its text,
    /// chunks and embeds it, and builds the document's vector index.
    /// Prints the new document id on success.
    Ingest {
        /// Path to the PDF file to ingest.
        file: PathBuf,

        /// Human-readable title for the document.
        #[arg(long)]
        title: Option<String>,
    },

    /// Answer a question against one document.
    ///
    /// Retrieves the most relevant chunks from the document's index and
    /// asks the configured chat model for an answer grounded in them.
    /// The document must have finished indexing (status `ready`).
    Ask {
        /// Document id (as printed by `ingest` or `list`).
        document_id: String,

        /// The question to answer.
        question: String,
    },

    /// Show a document's metadata and indexing status.
    Status {
        /// Document id.
        document_id: String,
    },

    /// List all documents, newest first.
    List,

    /// Rebuild a document's index from its stored file.
    ///
    /// Useful after changing the embedding model or chunking settings.
    /// The old index is replaced wholesale once the rebuild succeeds.
    Reindex {
        /// Document id.
        document_id: String,
    },

    /// Delete a document, its stored file, and its index.
    Delete {
        /// Document id.
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, title } => {
            ingest::run_ingest(&cfg, &file, title).await?;
        }
        Commands::Ask {
            document_id,
            question,
        } => {
            qa::run_ask(&cfg, &document_id, &question).await?;
        }
        Commands::Status { document_id } => {
            get::run_status(&cfg, &document_id).await?;
        }
        Commands::List => {
            get::run_list(&cfg).await?;
        }
        Commands::Reindex { document_id } => {
            ingest::run_reindex(&cfg, &document_id).await?;
        }
        Commands::Delete { document_id } => {
            ingest::run_delete(&cfg, &document_id).await?;
        }
    }

    Ok(())
}
