//! Retrieval pipeline orchestrator.
//!
//! [`retrieve`] is the synchronous core: search an index, apply the relevance
//! threshold and report the outcome as a [`RetrievalOutcome`]. The
//! [`RagPipeline`] wraps it with segmentation and an [`EmbeddingProvider`] to
//! cover the full ingest-and-query workflow.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, VectorIndex};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let mut index = VectorIndex::new();
//! pipeline.ingest(&mut index, &text, "notes.rtf").await?;
//! match pipeline.query(&index, "What changed?").await {
//!     RetrievalOutcome::Found { context, .. } => { /* prompt with context */ }
//!     RetrievalOutcome::Empty { best_score } => { /* answer without context */ }
//!     RetrievalOutcome::StoreError(e) => return Err(e),
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chat::{CONTEXT_SEPARATOR, ChatProvider, plain_messages, rag_messages};
use crate::chunking::Chunker;
use crate::config::{EmbeddingFailurePolicy, RagConfig};
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Result of a retrieval attempt.
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// At least one result met the relevance threshold.
    Found {
        /// Texts of `results` joined with [`CONTEXT_SEPARATOR`], best first.
        context: String,
        /// Surviving results in descending score order.
        results: Vec<SearchResult>,
    },
    /// No result met the threshold. `best_score` is the highest score seen,
    /// or `None` when the index is empty.
    Empty {
        /// Highest score among the unfiltered results.
        best_score: Option<f64>,
    },
    /// Retrieval could not run (dimension mismatch, query embedding failure,
    /// `k == 0`).
    StoreError(RagError),
}

impl RetrievalOutcome {
    /// Whether usable context was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Highest score seen, whether or not it passed the threshold.
    pub fn best_score(&self) -> Option<f64> {
        match self {
            Self::Found { results, .. } => results.first().map(|r| r.score),
            Self::Empty { best_score } => *best_score,
            Self::StoreError(_) => None,
        }
    }
}

/// Join result texts with [`CONTEXT_SEPARATOR`] in the given order.
pub fn build_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Search `index` for the `k` entries nearest `query` and keep those scoring
/// at least `min_score`.
///
/// `k` must be at least 1; `k == 0` yields [`RetrievalOutcome::StoreError`]
/// with a [`RagError::ConfigError`] rather than an empty result.
pub fn retrieve(index: &VectorIndex, query: &[f64], k: usize, min_score: f64) -> RetrievalOutcome {
    if k == 0 {
        return RetrievalOutcome::StoreError(RagError::ConfigError(
            "k must be at least 1".to_string(),
        ));
    }
    let all_results = match index.search(query, k) {
        Ok(results) => results,
        Err(e) => return RetrievalOutcome::StoreError(e),
    };
    let best_score = all_results.first().map(|r| r.score);

    let results: Vec<SearchResult> =
        all_results.into_iter().filter(|r| r.score >= min_score).collect();
    if results.is_empty() {
        return RetrievalOutcome::Empty { best_score };
    }

    let context = build_context(&results);
    RetrievalOutcome::Found { context, results }
}

/// A chunk whose embedding failed and was replaced by a zero vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingFailure {
    /// The chunk's `index`.
    pub chunk_index: usize,
    /// The provider's error message.
    pub message: String,
}

/// Summary of one [`RagPipeline::ingest`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Number of entries added to the index.
    pub chunk_count: usize,
    /// Chunks stored with a placeholder embedding.
    pub failures: Vec<EmbeddingFailure>,
}

/// An answer produced by [`RagPipeline::answer`].
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The question asked.
    pub question: String,
    /// The chat provider's reply.
    pub answer: String,
    /// Passages supplied as context; empty on the fallback path.
    pub sources: Vec<SearchResult>,
    /// Whether retrieved context was used.
    pub used_retrieval: bool,
    /// Best score seen when retrieval found nothing usable.
    pub best_score: Option<f64>,
}

/// The retrieval pipeline orchestrator.
///
/// Coordinates ingestion (chunk → embed → store) and queries
/// (embed → search → filter). Construct one via [`RagPipeline::builder()`].
/// The pipeline does not own an index: callers pass one in, which keeps the
/// single-writer discipline of [`VectorIndex`] visible at the call site.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Segment `text`, embed every chunk and append the results to `index`.
    ///
    /// Each entry carries `chunk_index`, `start_pos`, `end_pos` and
    /// `source_file` metadata. Embedding requests run with up to
    /// `embedding_concurrency` in flight; vectors are stored in chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] when an embedding fails under
    /// [`EmbeddingFailurePolicy::Abort`], or [`RagError::DimensionMismatch`]
    /// if the returned vectors disagree in width with each other or with
    /// entries already present. Nothing is added on error.
    pub async fn ingest(
        &self,
        index: &mut VectorIndex,
        text: &str,
        source: &str,
    ) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            info!(source, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport { chunk_count: 0, failures: Vec::new() });
        }

        let provider = &self.embedding_provider;
        let total = chunks.len();
        let outcomes: Vec<Result<Vec<f64>>> = stream::iter(chunks.iter())
            .map(|chunk| provider.embed(&chunk.text))
            .buffered(self.config.embedding_concurrency)
            .enumerate()
            .inspect(|(done, outcome)| {
                info!(source, done = done + 1, total, ok = outcome.is_ok(), "embedded chunk");
            })
            .map(|(_, outcome)| outcome)
            .collect()
            .await;

        // Placeholders take the width the provider actually returns; its
        // declared `dimensions()` is only a last resort.
        let placeholder_len = outcomes
            .iter()
            .find_map(|outcome| outcome.as_ref().ok().map(Vec::len))
            .or((!index.is_empty()).then_some(index.dimension()))
            .unwrap_or_else(|| provider.dimensions());
        let mut embeddings = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();
        for (chunk, outcome) in chunks.iter().zip(outcomes) {
            match outcome {
                Ok(embedding) => embeddings.push(embedding),
                Err(e) => match self.config.embedding_failure_policy {
                    EmbeddingFailurePolicy::Abort => {
                        error!(
                            source,
                            chunk = chunk.index,
                            error = %e,
                            "embedding failed during ingestion"
                        );
                        return Err(RagError::PipelineError(format!(
                            "embedding failed for chunk {} of '{source}': {e}",
                            chunk.index
                        )));
                    }
                    EmbeddingFailurePolicy::Placeholder => {
                        warn!(
                            source,
                            chunk = chunk.index,
                            error = %e,
                            "embedding failed, storing zero vector"
                        );
                        failures.push(EmbeddingFailure {
                            chunk_index: chunk.index,
                            message: e.to_string(),
                        });
                        embeddings.push(vec![0.0; placeholder_len]);
                    }
                },
            }
        }

        let expected = if index.is_empty() { placeholder_len } else { index.dimension() };
        if let Some(position) = embeddings.iter().position(|e: &Vec<f64>| e.len() != expected) {
            let err = RagError::DimensionMismatch { expected, actual: embeddings[position].len() };
            error!(
                source,
                chunk = chunks[position].index,
                error = %err,
                "embedding width disagrees with the index, nothing added"
            );
            return Err(err);
        }

        let metadata = chunks
            .iter()
            .map(|chunk| {
                HashMap::from([
                    ("chunk_index".to_string(), chunk.index.to_string()),
                    ("start_pos".to_string(), chunk.start_offset.to_string()),
                    ("end_pos".to_string(), chunk.end_offset.to_string()),
                    ("source_file".to_string(), source.to_string()),
                ])
            })
            .collect();
        let chunk_count = chunks.len();
        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();

        index.add_batch(texts, embeddings, metadata).inspect_err(|e| {
            error!(source, error = %e, "failed to add chunks to index");
        })?;

        info!(source, chunk_count, failed = failures.len(), "ingested document");
        Ok(IngestReport { chunk_count, failures })
    }

    /// Embed `question` and retrieve with the configured `top_k` and
    /// `min_relevance_score`.
    pub async fn query(&self, index: &VectorIndex, question: &str) -> RetrievalOutcome {
        self.query_with(index, question, self.config.top_k, self.config.min_relevance_score)
            .await
    }

    /// Embed `question` and retrieve with explicit `k` and `min_score`.
    pub async fn query_with(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
        min_score: f64,
    ) -> RetrievalOutcome {
        let query_embedding = match self.embedding_provider.embed(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(error = %e, "embedding failed during query");
                return RetrievalOutcome::StoreError(e);
            }
        };

        let outcome = retrieve(index, &query_embedding, k, min_score);
        match &outcome {
            RetrievalOutcome::Found { results, .. } => {
                info!(result_count = results.len(), "query completed");
            }
            RetrievalOutcome::Empty { best_score } => {
                info!(?best_score, min_score, "query found no relevant results");
            }
            RetrievalOutcome::StoreError(e) => {
                error!(error = %e, "vector index search failed");
            }
        }
        outcome
    }

    /// Answer `question` with `chat`, using retrieved context when any passes
    /// the threshold and asking the plain question otherwise.
    ///
    /// # Errors
    ///
    /// Returns the search error for [`RetrievalOutcome::StoreError`], or the
    /// chat provider's error.
    pub async fn answer(
        &self,
        index: &VectorIndex,
        question: &str,
        chat: &dyn ChatProvider,
    ) -> Result<Answer> {
        match self.query(index, question).await {
            RetrievalOutcome::Found { context, results } => {
                let answer = chat.complete(&rag_messages(question, &context)).await?;
                Ok(Answer {
                    question: question.to_string(),
                    answer,
                    best_score: results.first().map(|r| r.score),
                    sources: results,
                    used_retrieval: true,
                })
            }
            RetrievalOutcome::Empty { best_score } => {
                warn!(?best_score, "no relevant context, answering without retrieval");
                let answer = chat.complete(&plain_messages(question)).await?;
                Ok(Answer {
                    question: question.to_string(),
                    answer,
                    sources: Vec::new(),
                    used_retrieval: false,
                    best_score,
                })
            }
            RetrievalOutcome::StoreError(e) => Err(e),
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider is required. The chunker defaults to the one
/// described by the config's [`ChunkingStrategy`](crate::ChunkingStrategy),
/// and the config defaults to [`RagConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedding provider is missing
    /// or the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| config.chunking.chunker());

        Ok(RagPipeline { config, embedding_provider, chunker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(embeddings: &[[f64; 2]]) -> VectorIndex {
        let mut index = VectorIndex::new();
        for (i, e) in embeddings.iter().enumerate() {
            index.add(format!("text {i}"), e.to_vec(), HashMap::new()).unwrap();
        }
        index
    }

    #[test]
    fn threshold_filters_results() {
        let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]]);

        let outcome = retrieve(&index, &[1.0, 0.0], 3, 0.9);
        let RetrievalOutcome::Found { results, context } = outcome else {
            panic!("expected results");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 0);
        assert_eq!(context, "text 0");

        let outcome = retrieve(&index, &[1.0, 0.0], 3, 0.99);
        assert!(outcome.is_found());

        let outcome = retrieve(&index, &[0.6, 0.8], 3, 0.99);
        assert!(!outcome.is_found());
        let best = outcome.best_score().unwrap();
        assert!(best > 0.9 && best < 0.99);
    }

    #[test]
    fn context_joins_in_score_order() {
        let index = index_with(&[[0.0, 1.0], [1.0, 0.0], [0.7, 0.7]]);
        let RetrievalOutcome::Found { context, .. } = retrieve(&index, &[1.0, 0.0], 2, 0.0)
        else {
            panic!("expected results");
        };
        assert_eq!(context, "text 1\n\n---\n\ntext 2");
    }

    #[test]
    fn empty_index_reports_no_best_score() {
        let outcome = retrieve(&VectorIndex::new(), &[1.0], 5, 0.0);
        assert!(matches!(outcome, RetrievalOutcome::Empty { best_score: None }));
    }

    #[test]
    fn zero_k_is_rejected_not_empty() {
        let index = index_with(&[[1.0, 0.0]]);
        let outcome = retrieve(&index, &[1.0, 0.0], 0, 0.0);
        assert!(matches!(outcome, RetrievalOutcome::StoreError(RagError::ConfigError(_))));

        let outcome = retrieve(&VectorIndex::new(), &[1.0], 0, 0.0);
        assert!(!matches!(outcome, RetrievalOutcome::Empty { .. }));
    }

    #[test]
    fn dimension_error_is_a_store_error() {
        let index = index_with(&[[1.0, 0.0]]);
        let outcome = retrieve(&index, &[1.0, 0.0, 0.0], 5, 0.0);
        assert!(matches!(
            outcome,
            RetrievalOutcome::StoreError(RagError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn builder_requires_embedding_provider() {
        let err = RagPipeline::builder().build().err().unwrap();
        assert!(matches!(err, RagError::ConfigError(_)));
    }
}
