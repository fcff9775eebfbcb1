//! Retrieval core for document question answering.
//!
//! This crate turns extracted document text into retrievable passages and
//! answers similarity queries over them:
//!
//! - [`chunking`] segments text with a sliding window or along paragraphs
//! - [`index`] stores embeddings in a flat [`VectorIndex`] with cosine
//!   similarity search and JSON persistence
//! - [`pipeline`] composes segmentation, an [`EmbeddingProvider`] and the
//!   index, and reports retrieval as a [`RetrievalOutcome`]
//!
//! Embedding and chat backends are external collaborators behind the
//! [`EmbeddingProvider`] and [`ChatProvider`] traits. HTTP implementations
//! are available behind the `ollama` and `openrouter` features.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{RagConfig, RagPipeline, RetrievalOutcome, VectorIndex};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new()))
//!     .build()?;
//!
//! let mut index = VectorIndex::new();
//! let report = pipeline.ingest(&mut index, &text, "manual.rtf").await?;
//! index.save("embeddings_index.json")?;
//!
//! if let RetrievalOutcome::Found { context, .. } = pipeline.query(&index, "How?").await {
//!     println!("{context}");
//! }
//! ```

pub mod chat;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod pipeline;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openrouter")]
pub mod openrouter;

pub use chat::{CONTEXT_SEPARATOR, ChatMessage, ChatProvider, Role, plain_messages, rag_messages};
pub use chunking::{Chunker, ParagraphChunker, SlidingWindowChunker};
pub use config::{ChunkingStrategy, EmbeddingFailurePolicy, RagConfig, RagConfigBuilder};
pub use document::{Chunk, IndexData, IndexEntry, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{PlainTextExtractor, RtfExtractor, TextExtractor, extractor_for};
pub use index::{IndexStats, VectorIndex, cosine_similarity};
pub use pipeline::{
    Answer, EmbeddingFailure, IngestReport, RagPipeline, RagPipelineBuilder, RetrievalOutcome,
    build_context, retrieve,
};

#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbeddingProvider;
#[cfg(feature = "openrouter")]
pub use openrouter::OpenRouterChatProvider;
