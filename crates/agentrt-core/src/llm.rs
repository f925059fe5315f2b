// LlmProvider contract: OpenAI-compatible chat completion shape, streamed
// or not. Adapters (agentrt-openai, agentrt-anthropic) implement this trait.

use crate::error::Result;
use agentrt_contracts::tools::ToolDefinition;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    pub function_name: String,
    /// JSON-encoded argument string, possibly partial mid-stream.
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRoleOrNone,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

/// `ChatRole` wrapped to allow a "no role carried" default for stream deltas
/// that only ever patch content/tool_calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChatRoleOrNone(pub Option<ChatRole>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    None,
    Auto,
    Required,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub response_format: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
    /// Set when the agentic loop hit `maxIterations` and this response is
    /// the last assistant turn rather than a natural stop.
    #[serde(default)]
    pub iteration_limit_reached: bool,
}

/// A streamed delta over the same shape as `ChatResponse`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    pub delta: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream>;
}

/// Merge streaming tool-call deltas by id: later deltas with the same id
/// append to that call's `arguments` string; a new id appends a new call.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    calls: Vec<ChatToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, delta: &ChatToolCall) {
        if let Some(existing) = self.calls.iter_mut().find(|c| c.id == delta.id) {
            existing.arguments.push_str(&delta.arguments);
            if existing.function_name.is_empty() {
                existing.function_name = delta.function_name.clone();
            }
        } else {
            self.calls.push(delta.clone());
        }
    }

    pub fn into_calls(self) -> Vec<ChatToolCall> {
        self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_merges_arguments_by_id_and_appends_new_ids() {
        let mut acc = ToolCallAccumulator::new();
        acc.merge(&ChatToolCall {
            id: "call_1".into(),
            function_name: "get_weather".into(),
            arguments: "{\"loc".into(),
        });
        acc.merge(&ChatToolCall {
            id: "call_1".into(),
            function_name: String::new(),
            arguments: "\":\"NYC\"}".into(),
        });
        acc.merge(&ChatToolCall {
            id: "call_2".into(),
            function_name: "get_current_time".into(),
            arguments: "{}".into(),
        });

        let calls = acc.into_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, "{\"loc\":\"NYC\"}");
        assert_eq!(calls[0].function_name, "get_weather");
        assert_eq!(calls[1].id, "call_2");
    }
}
