//! Chat completion provider trait and prompt assembly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Separator placed between retrieved passages in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const RAG_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using the \
provided document excerpts. Base your answer on the excerpts. If they do not contain the \
answer, say so.";

const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// The asking party.
    User,
    /// The model.
    Assistant,
}

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A provider that turns a message sequence into an answer.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete the conversation and return the assistant's reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Messages for answering `question` from retrieved `context`.
pub fn rag_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(RAG_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Document excerpts:\n\n{context}\n\nQuestion: {question}"
        )),
    ]
}

/// Messages for answering `question` without retrieved context.
pub fn plain_messages(question: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(PLAIN_SYSTEM_PROMPT), ChatMessage::user(question)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn rag_messages_embed_context_and_question() {
        let messages = rag_messages("Why?", "passage one");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("passage one"));
        assert!(messages[1].content.ends_with("Question: Why?"));
    }

    #[test]
    fn plain_messages_pass_question_through() {
        let messages = plain_messages("Why?");
        assert_eq!(messages[1], ChatMessage::user("Why?"));
    }
}
