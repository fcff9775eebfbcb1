//! OpenRouter chat provider using the OpenAI-compatible completions API.
//!
//! This module is only available when the `openrouter` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::chat::{ChatMessage, ChatProvider};
use crate::error::{RagError, Result};

/// The default OpenRouter API base.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// The default chat model.
const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`ChatProvider`] backed by OpenRouter's `/chat/completions` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openrouter::OpenRouterChatProvider;
///
/// let chat = OpenRouterChatProvider::from_env()?;
/// let reply = chat.complete(&messages).await?;
/// ```
pub struct OpenRouterChatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterChatProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(chat_error("API key must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| chat_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_key, model: DEFAULT_MODEL.into(), base_url: DEFAULT_BASE_URL.into() })
    }

    /// Create a new provider from `OPENROUTER_API_KEY`, honouring
    /// `OPENROUTER_MODEL` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| chat_error("OPENROUTER_API_KEY environment variable not set".into()))?;
        let mut provider = Self::new(api_key)?;
        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            provider = provider.with_model(model);
        }
        Ok(provider)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API base URL (any OpenAI-compatible endpoint works).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn chat_error(message: String) -> RagError {
    RagError::ChatError { provider: "OpenRouter".into(), message }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    code: Option<serde_json::Value>,
}

/// Pull the reply out of a decoded response body. Providers may return an
/// `error` object with a 200 status, so this checks for it first.
fn extract_reply(response: ChatResponse) -> Result<String> {
    if let Some(err) = response.error {
        let code = err.code.map(|c| format!(" (code {c})")).unwrap_or_default();
        return Err(chat_error(format!("{}{code}", err.message)));
    }
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| chat_error("API returned no choices".into()))
}

// ── ChatProvider implementation ────────────────────────────────────

#[async_trait]
impl ChatProvider for OpenRouterChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            provider = "OpenRouter",
            model = %self.model,
            message_count = messages.len(),
            "chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model: &self.model, messages })
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenRouter", error = %e, "request failed");
                chat_error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(provider = "OpenRouter", error = %e, "failed to read response");
            chat_error(format!("failed to read response: {e}"))
        })?;

        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => extract_reply(parsed).inspect_err(|e| {
                error!(provider = "OpenRouter", %status, error = %e, "API error");
            }),
            Err(e) if status.is_success() => {
                error!(provider = "OpenRouter", error = %e, "failed to parse response");
                Err(chat_error(format!("failed to parse response: {e}")))
            }
            Err(_) => {
                error!(provider = "OpenRouter", %status, "API error");
                Err(chat_error(format!("API returned {status}: {body}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_comes_from_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"42"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "42");
    }

    #[test]
    fn error_payload_is_surfaced() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"error":{"message":"rate limited","code":429}}"#).unwrap();
        let err = extract_reply(response).unwrap_err();
        assert!(matches!(err, RagError::ChatError { .. }));
        assert!(err.to_string().contains("rate limited (code 429)"));
    }

    #[test]
    fn empty_choices_is_an_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_reply(response).is_err());
    }

    #[test]
    fn rejects_empty_api_key() {
        assert!(OpenRouterChatProvider::new("").is_err());
    }
}
