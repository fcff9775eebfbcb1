use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "docqa", about = "Index documents and ask questions about them", version)]
struct Cli {
    /// JSON file with pipeline settings; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks, embed them and save the index
    Index {
        /// Document to index (.rtf or plain text)
        file: PathBuf,
        /// Output path for the index
        #[arg(short, long, default_value = "embeddings_index.json")]
        index: PathBuf,
        /// Characters per chunk (sliding window)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive chunks (sliding window)
        #[arg(long)]
        overlap: Option<usize>,
        /// Split along paragraphs instead of a sliding window
        #[arg(long)]
        paragraph: bool,
        /// Largest paragraph kept whole (paragraph mode)
        #[arg(long, default_value_t = 1000)]
        max_chunk: usize,
        /// Smallest paragraph kept (paragraph mode)
        #[arg(long, default_value_t = 100)]
        min_chunk: usize,
        /// Fail instead of storing a zero vector when a chunk cannot be embedded
        #[arg(long)]
        abort_on_embedding_error: bool,
        /// Embedding requests in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the passages most similar to a query
    Search {
        /// Path to the index file
        index: PathBuf,
        /// Search query text
        query: String,
        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Minimum cosine similarity
        #[arg(long)]
        min_score: Option<f64>,
    },
    /// Show statistics about an index
    Stats {
        /// Path to the index file
        index: PathBuf,
    },
    /// Answer a question with retrieved passages as context
    Ask {
        /// Path to the index file
        index: PathBuf,
        /// The question
        question: String,
        /// Number of passages to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Minimum cosine similarity for a passage to be used
        #[arg(long)]
        min_score: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Index {
            file,
            index,
            chunk_size,
            overlap,
            paragraph,
            max_chunk,
            min_chunk,
            abort_on_embedding_error,
            concurrency,
        } => {
            let options = commands::IndexOptions {
                chunk_size,
                overlap,
                paragraph: paragraph.then_some((max_chunk, min_chunk)),
                abort_on_embedding_error,
                concurrency,
            };
            commands::index(config, &file, &index, options).await
        }
        Commands::Search { index, query, top_k, min_score } => {
            commands::search(config, &index, &query, top_k, min_score).await
        }
        Commands::Stats { index } => commands::stats(&index),
        Commands::Ask { index, question, top_k, min_score } => {
            commands::ask(config, &index, &question, top_k, min_score).await
        }
    }
}
