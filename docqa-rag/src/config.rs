//! Configuration for segmentation and retrieval.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunking::{Chunker, ParagraphChunker, SlidingWindowChunker};
use crate::error::{RagError, Result};

/// Which segmentation strategy to run, with its parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Fixed-size windows with overlap. See [`SlidingWindowChunker`].
    SlidingWindow {
        /// Target chunk length in characters.
        chunk_size: usize,
        /// Characters shared between consecutive windows.
        overlap: usize,
    },
    /// Paragraph-aware splitting with size bounds. See [`ParagraphChunker`].
    Paragraph {
        /// Paragraphs longer than this are split into sentences.
        max_chunk_size: usize,
        /// Paragraphs and sub-chunks shorter than this are dropped.
        min_chunk_size: usize,
    },
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::SlidingWindow { chunk_size: 500, overlap: 50 }
    }
}

impl ChunkingStrategy {
    /// Paragraph strategy with the default bounds.
    pub fn paragraph() -> Self {
        Self::Paragraph { max_chunk_size: 1000, min_chunk_size: 100 }
    }

    /// Build the chunker for this strategy.
    pub fn chunker(&self) -> Arc<dyn Chunker> {
        match *self {
            Self::SlidingWindow { chunk_size, overlap } => {
                Arc::new(SlidingWindowChunker::new(chunk_size, overlap))
            }
            Self::Paragraph { max_chunk_size, min_chunk_size } => {
                Arc::new(ParagraphChunker::new(max_chunk_size, min_chunk_size))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::SlidingWindow { chunk_size, overlap } => {
                if chunk_size == 0 {
                    return Err(RagError::ConfigError(
                        "chunk_size must be greater than zero".to_string(),
                    ));
                }
                if overlap >= chunk_size {
                    return Err(RagError::ConfigError(format!(
                        "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
                    )));
                }
            }
            Self::Paragraph { max_chunk_size, min_chunk_size } => {
                if min_chunk_size >= max_chunk_size {
                    return Err(RagError::ConfigError(format!(
                        "min_chunk_size ({min_chunk_size}) must be less than max_chunk_size ({max_chunk_size})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What to do when embedding an individual chunk fails during ingestion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFailurePolicy {
    /// Substitute a zero vector of the provider's dimension and keep going.
    /// Every substitution is reported back to the caller.
    #[default]
    Placeholder,
    /// Fail the whole ingestion on the first error.
    Abort,
}

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Segmentation strategy.
    pub chunking: ChunkingStrategy,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results. 0.0 disables filtering of
    /// non-negative scores.
    pub min_relevance_score: f64,
    /// Handling of per-chunk embedding failures.
    pub embedding_failure_policy: EmbeddingFailurePolicy,
    /// Maximum embedding requests in flight during ingestion.
    pub embedding_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingStrategy::default(),
            top_k: 5,
            min_relevance_score: 0.0,
            embedding_failure_policy: EmbeddingFailurePolicy::default(),
            embedding_concurrency: 1,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Read and validate a JSON configuration file. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read,
    /// [`RagError::Serialization`] if it is not valid JSON, and
    /// [`RagError::ConfigError`] if the values are inconsistent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - the chunking parameters are out of range
    /// - `top_k == 0`
    /// - `min_relevance_score` is outside `[-1, 1]`
    /// - `embedding_concurrency == 0`
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.min_relevance_score) {
            return Err(RagError::ConfigError(format!(
                "min_relevance_score ({}) must be within [-1, 1]",
                self.min_relevance_score
            )));
        }
        if self.embedding_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embedding_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the segmentation strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score for keeping a result.
    pub fn min_relevance_score(mut self, score: f64) -> Self {
        self.config.min_relevance_score = score;
        self
    }

    /// Set the per-chunk embedding failure policy.
    pub fn embedding_failure_policy(mut self, policy: EmbeddingFailurePolicy) -> Self {
        self.config.embedding_failure_policy = policy;
        self
    }

    /// Set the maximum number of concurrent embedding requests.
    pub fn embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding_concurrency = concurrency;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.chunking, ChunkingStrategy::SlidingWindow { chunk_size: 500, overlap: 50 });
    }

    #[test]
    fn rejects_overlap_not_below_chunk_size() {
        let err = RagConfig::builder()
            .chunking(ChunkingStrategy::SlidingWindow { chunk_size: 100, overlap: 100 })
            .build()
            .unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_inverted_paragraph_bounds() {
        let result = RagConfig::builder()
            .chunking(ChunkingStrategy::Paragraph { max_chunk_size: 50, min_chunk_size: 50 })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_top_k_and_out_of_range_score() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().min_relevance_score(1.5).build().is_err());
        assert!(RagConfig::builder().embedding_concurrency(0).build().is_err());
    }

    #[test]
    fn strategy_is_tagged_in_json() {
        let json = serde_json::to_value(ChunkingStrategy::paragraph()).unwrap();
        assert_eq!(json["strategy"], "paragraph");
        assert_eq!(json["max_chunk_size"], 1000);
    }

    #[test]
    fn from_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"chunking":{"strategy":"paragraph","max_chunk_size":800,"min_chunk_size":40},"top_k":3}"#,
        )
        .unwrap();
        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.min_relevance_score, 0.0);
        assert_eq!(
            config.chunking,
            ChunkingStrategy::Paragraph { max_chunk_size: 800, min_chunk_size: 40 }
        );
    }
}
