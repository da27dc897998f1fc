//! # askdoc CLI
//!
//! The `askdoc` binary is the interface to the document question-answering
//! pipeline: initialize storage, ingest documents, inspect the corpus,
//! retrieve relevant passages, and ask questions.
//!
//! ## Usage
//!
//! ```bash
//! askdoc --config ./config/askdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdoc init` | Create the storage directory and vector index |
//! | `askdoc ingest <path>` | Ingest a document (PDF, text, or Markdown) |
//! | `askdoc documents` | List ingested documents |
//! | `askdoc retrieve "<query>"` | Show the passages relevant to a query |
//! | `askdoc ask "<question>"` | Answer a question grounded in the corpus |
//! | `askdoc delete <filename>` | Remove a document and its indexed chunks |
//! | `askdoc reset` | Remove every document and indexed chunk |
//! | `askdoc stats` | Show index counters |
//!
//! ## Examples
//!
//! ```bash
//! # One-time setup
//! askdoc init
//!
//! # Ingest a PDF, then a Markdown file under a different stored name
//! askdoc ingest ./manuals/warranty.pdf
//! askdoc ingest ./notes.md --name meeting-notes.md
//!
//! # Inspect what retrieval would feed the model
//! askdoc retrieve "how long is the warranty?" --top-k 3
//!
//! # Ask a question
//! askdoc ask "how long is the warranty?"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use askdoc::answer::AnswerEngine;
use askdoc::config::{self, Config};
use askdoc::db;
use askdoc::embedding::{EmbeddingClient, OpenAiEmbeddings};
use askdoc::generate::OpenAiGeneration;
use askdoc::index::VectorIndex;
use askdoc::index_sqlite::SqliteIndex;
use askdoc::ingest::Pipeline;
use askdoc::retrieve::Retriever;
use askdoc::store::{FsObjectStore, ObjectStore};

/// askdoc — question answering over your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askdoc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askdoc",
    about = "Question answering over your own documents",
    version,
    long_about = "askdoc ingests documents (PDF, plain text, Markdown) into a local object \
    store and SQLite vector index, then answers questions grounded in the most relevant \
    chunks via an OpenAI-compatible embedding and chat API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize storage.
    ///
    /// Creates the document directory and the SQLite vector table.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document.
    ///
    /// Stores the original bytes, extracts text, chunks it, embeds the
    /// chunks, and indexes them. Re-ingesting the same name replaces the
    /// previous version.
    Ingest {
        /// Path to the document (`.pdf`, `.txt`, or `.md`).
        path: PathBuf,

        /// Store under this filename instead of the path's basename.
        #[arg(long)]
        name: Option<String>,
    },

    /// List ingested documents.
    Documents,

    /// Retrieve the passages relevant to a query.
    ///
    /// Shows what the `ask` command would feed the model, with scores.
    Retrieve {
        /// The query string.
        query: String,

        /// Maximum number of passages (default from config).
        #[arg(long)]
        top_k: Option<usize>,

        /// Relevance threshold; passages must score strictly above it.
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Answer a question grounded in the ingested documents.
    Ask {
        /// The question string.
        question: String,
    },

    /// Remove a document and its indexed chunks.
    ///
    /// Succeeds even if the document was never ingested.
    Delete {
        /// Stored filename (as shown by `documents`).
        filename: String,
    },

    /// Remove every document and every indexed chunk.
    Reset,

    /// Show index counters.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askdoc=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pipeline = build_pipeline(&cfg).await?;
            pipeline.ensure_ready().await?;
            println!("Storage initialized successfully.");
        }
        Commands::Ingest { path, name } => {
            run_ingest(&cfg, &path, name).await?;
        }
        Commands::Documents => {
            run_documents(&cfg).await?;
        }
        Commands::Retrieve {
            query,
            top_k,
            min_score,
        } => {
            run_retrieve(&cfg, &query, top_k, min_score).await?;
        }
        Commands::Ask { question } => {
            run_ask(&cfg, &question).await?;
        }
        Commands::Delete { filename } => {
            let pipeline = build_pipeline(&cfg).await?;
            let removed = pipeline.delete_document(&filename).await?;
            println!("Deleted {} ({} chunks removed).", filename, removed);
        }
        Commands::Reset => {
            let pipeline = build_pipeline(&cfg).await?;
            let removed = pipeline.reset_all().await?;
            println!("Reset complete ({} chunks removed).", removed);
        }
        Commands::Stats => {
            let index = build_index(&cfg).await?;
            let stats = index.stats().await?;
            println!("Indexed chunks: {}", stats.record_count);
        }
    }

    Ok(())
}

async fn build_index(cfg: &Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let pool = db::connect(&cfg.db.path).await?;
    let index = SqliteIndex::new(pool);
    index.ensure_ready().await?;
    Ok(Arc::new(index))
}

fn build_store(cfg: &Config) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(cfg.storage.root.clone()))
}

fn build_embedder(cfg: &Config) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    Ok(Arc::new(OpenAiEmbeddings::new(&cfg.embedding)?))
}

async fn build_pipeline(cfg: &Config) -> anyhow::Result<Pipeline> {
    Ok(Pipeline::new(
        build_store(cfg),
        build_index(cfg).await?,
        build_embedder(cfg)?,
        cfg,
    ))
}

async fn build_retriever(cfg: &Config) -> anyhow::Result<Retriever> {
    Ok(Retriever::new(
        build_index(cfg).await?,
        build_embedder(cfg)?,
        cfg.retrieval.top_k,
        cfg.retrieval.min_score,
    ))
}

async fn run_ingest(cfg: &Config, path: &Path, name: Option<String>) -> anyhow::Result<()> {
    let filename = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("path has no filename: {}", path.display()))?,
    };

    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;

    let pipeline = build_pipeline(cfg).await?;
    pipeline.ensure_ready().await?;
    let report = pipeline.ingest(&filename, &bytes).await?;

    println!("Ingested {}", report.filename);
    println!("  chunks:  {}", report.chunk_count);
    println!("  batches: {}", report.batches);
    println!("  sha256:  {}", report.content_hash);
    Ok(())
}

async fn run_documents(cfg: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(cfg).await?;
    let documents = pipeline.documents().await?;

    if documents.is_empty() {
        println!("No documents ingested.");
        return Ok(());
    }

    println!("{} document(s):", documents.len());
    for doc in documents {
        println!(
            "  {}  {} bytes  {}",
            doc.key,
            doc.size,
            doc.modified_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn run_retrieve(
    cfg: &Config,
    query: &str,
    top_k: Option<usize>,
    min_score: Option<f32>,
) -> anyhow::Result<()> {
    let retriever = build_retriever(cfg).await?;
    let passages = retriever.retrieve(query, top_k, min_score).await?;

    if passages.is_empty() {
        println!("No relevant passages found.");
        return Ok(());
    }

    for (rank, passage) in passages.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} - {}",
            rank + 1,
            passage.score,
            passage.source,
            snippet(&passage.text, 120)
        );
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> anyhow::Result<()> {
    let retriever = build_retriever(cfg).await?;
    let generator = Arc::new(OpenAiGeneration::new(&cfg.generation)?);
    let engine = AnswerEngine::new(retriever, generator);

    let answer = engine.answer(question).await?;
    println!("{}", answer.text);

    if !answer.passages.is_empty() {
        println!();
        println!("Sources:");
        for passage in &answer.passages {
            println!("  [{:.4}] {}", passage.score, passage.source);
        }
    }
    Ok(())
}

/// First `max` characters of a single-line rendering of `text`.
fn snippet(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let truncated: String = flat.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
