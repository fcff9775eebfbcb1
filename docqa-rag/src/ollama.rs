//! Ollama embedding provider using the local Ollama HTTP API.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default Ollama server address.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model.
const DEFAULT_MODEL: &str = "nomic-embed-text";

/// The dimensionality of `nomic-embed-text`.
const DEFAULT_DIMENSIONS: usize = 768;

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embeddings` endpoint.
///
/// # Configuration
///
/// - `base_url` – defaults to `http://localhost:11434`, or `OLLAMA_BASE_URL`.
/// - `model` – defaults to `nomic-embed-text`, or `OLLAMA_EMBED_MODEL`.
/// - `dimensions` – used for zero-vector placeholders; set it to match the
///   model with [`with_dimensions`](OllamaEmbeddingProvider::with_dimensions).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the default local server and model.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Create a provider honouring `OLLAMA_BASE_URL` and `OLLAMA_EMBED_MODEL`.
    pub fn from_env() -> Self {
        let mut provider = Self::new();
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            provider = provider.with_base_url(url);
        }
        if let Ok(model) = std::env::var("OLLAMA_EMBED_MODEL") {
            provider = provider.with_model(model);
        }
        provider
    }

    /// Set the server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `mxbai-embed-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the dimensionality reported by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: "Ollama".into(), message }
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        debug!(provider = "Ollama", model = %self.model, text_len = text.len(), "embedding text");

        let request_body = EmbeddingRequest { model: &self.model, prompt: text };

        let response =
            self.client.post(self.endpoint()).json(&request_body).send().await.map_err(|e| {
                error!(provider = "Ollama", error = %e, "request failed");
                embedding_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

            error!(provider = "Ollama", %status, "API error");
            return Err(embedding_error(format!("API returned {status}: {detail}")));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse response");
            embedding_error(format!("failed to parse response: {e}"))
        })?;

        if embedding_response.embedding.is_empty() {
            return Err(embedding_error("API returned an empty embedding".into()));
        }
        Ok(embedding_response.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_prompt_field() {
        let json =
            serde_json::to_value(EmbeddingRequest { model: "nomic-embed-text", prompt: "hi" })
                .unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["prompt"], "hi");
    }

    #[test]
    fn response_parses_embedding() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"embedding":[0.5,-1.0],"extra":true}"#).unwrap();
        assert_eq!(response.embedding, vec![0.5, -1.0]);
    }

    #[test]
    fn base_url_is_normalized() {
        let provider = OllamaEmbeddingProvider::new().with_base_url("http://gpu-box:11434/");
        assert_eq!(provider.endpoint(), "http://gpu-box:11434/api/embeddings");
        assert_eq!(provider.dimensions(), 768);
    }
}
