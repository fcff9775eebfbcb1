//! Subcommand implementations for the `docqa` binary.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use docqa_rag::{
    ChunkingStrategy, EmbeddingFailurePolicy, OllamaEmbeddingProvider, OpenRouterChatProvider,
    RagConfig, RagPipeline, RetrievalOutcome, SearchResult, VectorIndex, extractor_for,
};
use tracing::debug;

const PREVIEW_CHARS: usize = 200;

/// Overrides for `docqa index` taken from the command line.
pub struct IndexOptions {
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    /// `(max_chunk_size, min_chunk_size)` when paragraph mode is selected.
    pub paragraph: Option<(usize, usize)>,
    pub abort_on_embedding_error: bool,
    pub concurrency: Option<usize>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RagConfig> {
    match path {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RagConfig::default()),
    }
}

fn pipeline(config: RagConfig) -> anyhow::Result<RagPipeline> {
    let provider = OllamaEmbeddingProvider::from_env();
    Ok(RagPipeline::builder().config(config).embedding_provider(Arc::new(provider)).build()?)
}

fn open_index(path: &Path) -> anyhow::Result<VectorIndex> {
    VectorIndex::open(path).with_context(|| format!("failed to load index {}", path.display()))
}

fn apply_index_options(mut config: RagConfig, options: IndexOptions) -> anyhow::Result<RagConfig> {
    if let Some((max_chunk_size, min_chunk_size)) = options.paragraph {
        if options.chunk_size.is_some() || options.overlap.is_some() {
            bail!("--chunk-size and --overlap apply to sliding-window chunking, not --paragraph");
        }
        config.chunking = ChunkingStrategy::Paragraph { max_chunk_size, min_chunk_size };
    } else if options.chunk_size.is_some() || options.overlap.is_some() {
        let (base_size, base_overlap) = match config.chunking {
            ChunkingStrategy::SlidingWindow { chunk_size, overlap } => (chunk_size, overlap),
            ChunkingStrategy::Paragraph { .. } => (500, 50),
        };
        config.chunking = ChunkingStrategy::SlidingWindow {
            chunk_size: options.chunk_size.unwrap_or(base_size),
            overlap: options.overlap.unwrap_or(base_overlap),
        };
    }
    if options.abort_on_embedding_error {
        config.embedding_failure_policy = EmbeddingFailurePolicy::Abort;
    }
    if let Some(concurrency) = options.concurrency {
        config.embedding_concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

fn apply_query_options(
    mut config: RagConfig,
    top_k: Option<usize>,
    min_score: Option<f64>,
) -> anyhow::Result<RagConfig> {
    if let Some(k) = top_k {
        config.top_k = k;
    }
    if let Some(score) = min_score {
        config.min_relevance_score = score;
    }
    config.validate()?;
    Ok(config)
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn print_results(results: &[SearchResult]) {
    for (rank, result) in results.iter().enumerate() {
        println!("\n{}. Score: {:.4}", rank + 1, result.score);
        println!("   Text: {}", preview(&result.text));
        if !result.metadata.is_empty() {
            let mut pairs: Vec<_> = result.metadata.iter().collect();
            pairs.sort();
            let rendered: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("   Metadata: {}", rendered.join(", "));
        }
    }
}

pub async fn index(
    config: RagConfig,
    file: &Path,
    index_path: &Path,
    options: IndexOptions,
) -> anyhow::Result<()> {
    let config = apply_index_options(config, options)?;
    debug!(?config, "indexing configuration");

    println!("Reading {}...", file.display());
    let text = extractor_for(file).extract(file)?;
    println!("Extracted {} characters", text.chars().count());

    let pipeline = pipeline(config)?;
    let source = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let mut index = VectorIndex::new();
    let report = pipeline.ingest(&mut index, &text, &source).await?;

    println!("Created {} chunks", report.chunk_count);
    if !report.failures.is_empty() {
        println!(
            "{} chunks could not be embedded and were stored as zero vectors:",
            report.failures.len()
        );
        for failure in &report.failures {
            println!("  chunk {}: {}", failure.chunk_index, failure.message);
        }
    }

    index.save(index_path)?;
    println!("Index saved to {}", index_path.display());
    println!("{}", index.stats());
    Ok(())
}

pub async fn search(
    config: RagConfig,
    index_path: &Path,
    query: &str,
    top_k: Option<usize>,
    min_score: Option<f64>,
) -> anyhow::Result<()> {
    let config = apply_query_options(config, top_k, min_score)?;
    let index = open_index(index_path)?;
    let (k, min) = (config.top_k, config.min_relevance_score);
    let pipeline = pipeline(config)?;

    println!("Searching for: \"{query}\"");
    match pipeline.query_with(&index, query, k, min).await {
        RetrievalOutcome::Found { results, .. } => {
            println!("Top {} results:", results.len());
            print_results(&results);
        }
        RetrievalOutcome::Empty { best_score: Some(best) } => {
            println!("No passage reached score {min:.4} (best was {best:.4})");
        }
        RetrievalOutcome::Empty { best_score: None } => println!("The index has no entries"),
        RetrievalOutcome::StoreError(e) => return Err(e).context("search failed"),
    }
    Ok(())
}

pub fn stats(index_path: &Path) -> anyhow::Result<()> {
    let index = open_index(index_path)?;
    println!("{}", index.stats());
    Ok(())
}

pub async fn ask(
    config: RagConfig,
    index_path: &Path,
    question: &str,
    top_k: Option<usize>,
    min_score: Option<f64>,
) -> anyhow::Result<()> {
    let config = apply_query_options(config, top_k, min_score)?;
    let index = open_index(index_path)?;
    let chat = OpenRouterChatProvider::from_env()?;
    let pipeline = pipeline(config)?;

    let answer = pipeline.answer(&index, question, &chat).await?;
    if answer.used_retrieval {
        println!("Answer (from {} passages):\n", answer.sources.len());
    } else {
        match answer.best_score {
            Some(best) => {
                println!("No relevant passages (best score {best:.4}); answering without context:\n")
            }
            None => println!("No passages available; answering without context:\n"),
        }
    }
    println!("{}", answer.answer);
    if answer.used_retrieval {
        println!("\nSources:");
        print_results(&answer.sources);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> IndexOptions {
        IndexOptions {
            chunk_size: None,
            overlap: None,
            paragraph: None,
            abort_on_embedding_error: false,
            concurrency: None,
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(250);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn sliding_window_overrides_keep_other_field() {
        let options = IndexOptions { overlap: Some(20), ..no_overrides() };
        let config = apply_index_options(RagConfig::default(), options).unwrap();
        assert_eq!(config.chunking, ChunkingStrategy::SlidingWindow { chunk_size: 500, overlap: 20 });
    }

    #[test]
    fn paragraph_mode_rejects_window_flags() {
        let options =
            IndexOptions { paragraph: Some((1000, 100)), chunk_size: Some(10), ..no_overrides() };
        assert!(apply_index_options(RagConfig::default(), options).is_err());
    }

    #[test]
    fn invalid_overrides_fail_validation() {
        let options = IndexOptions { chunk_size: Some(50), overlap: Some(50), ..no_overrides() };
        assert!(apply_index_options(RagConfig::default(), options).is_err());
        assert!(apply_query_options(RagConfig::default(), None, Some(1.5)).is_err());
    }

    #[test]
    fn query_overrides_apply() {
        let config = apply_query_options(RagConfig::default(), Some(2), Some(0.25)).unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.min_relevance_score, 0.25);
    }
}
