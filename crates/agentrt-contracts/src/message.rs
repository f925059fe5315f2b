// AgentMessage: an append-only entry in a session's conversation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        };
        write!(f, "{s}")
    }
}

/// A single part of a (possibly multimodal) message's content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String, detail: Option<String> },
    File { url: String, name: Option<String> },
}

/// Message content: plain text, or structured multimodal parts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to a plain-text representation (used for LLM calls and
    /// token estimation). Non-text parts are summarized by a tag.
    pub fn as_plain_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.clone(),
                    ContentPart::ImageUrl { url, .. } => format!("[image: {url}]"),
                    ContentPart::File { name, url } => {
                        format!("[file: {}]", name.clone().unwrap_or_else(|| url.clone()))
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Estimate token count as len/4, rounded up, matching the spec's
    /// approximation everywhere token budgets are enforced.
    pub fn estimate_tokens(&self) -> u32 {
        estimate_tokens(&self.as_plain_text())
    }
}

/// ceil(len / 4) token estimate used throughout the runtime and memory subsystem.
pub fn estimate_tokens(text: &str) -> u32 {
    let len = text.chars().count();
    ((len + 3) / 4) as u32
}

/// A tool call requested by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    /// JSON-encoded argument string, as delivered by the LLM.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    pub tokens: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AgentMessage {
    pub fn new(session_id: Uuid, role: MessageRole, content: MessageContent) -> Self {
        let tokens = content.estimate_tokens();
        Self {
            id: Uuid::now_v7(),
            session_id,
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            tokens,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn text(session_id: Uuid, role: MessageRole, text: impl Into<String>) -> Self {
        Self::new(session_id, role, MessageContent::Text(text.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn multimodal_content_flattens_for_token_estimate() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "hi".into() },
            ContentPart::ImageUrl {
                url: "https://x/y.png".into(),
                detail: None,
            },
        ]);
        assert!(content.as_plain_text().contains("hi"));
        assert!(content.as_plain_text().contains("[image:"));
    }
}
