// Scripted LLM provider for tests. Not behind `#[cfg(test)]`: it is plain
// public API so integration tests in `tests/` (a separate compilation unit)
// can build a `RuntimeManager` against it without duplicating the
// `LlmProvider` impl, mirroring the teacher's always-compiled
// `MockLlmProvider` in `everruns-core::memory`.

use crate::error::Result;
use crate::llm::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatRoleOrNone, ChatStream,
    ChatToolCall, ChatUsage, FinishReason, LlmProvider,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Plays back a fixed queue of responses, one per call; once exhausted,
/// repeats the last response. Records every request it receives so a test
/// can assert on what the runtime actually sent.
#[derive(Default)]
pub struct ScriptedLlmProvider {
    responses: Vec<ChatResponse>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlmProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in call order.
    pub async fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut calls = self.calls.lock().await;
        let index = calls.len();
        calls.push(request);
        Ok(self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .expect("ScriptedLlmProvider needs at least one response"))
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream> {
        unimplemented!("ScriptedLlmProvider does not support streaming")
    }
}

/// A final assistant-text response with `finish_reason: stop`.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        id: "scripted".into(),
        created: 0,
        model: "mock".into(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::Assistant)),
                content: Some(text.to_string()),
                tool_calls: None,
                tool_call_id: None,
            },
            finish_reason: FinishReason::Stop,
        }],
        usage: ChatUsage::default(),
        iteration_limit_reached: false,
    }
}

/// An assistant response carrying a single tool call.
pub fn tool_call_response(call_id: &str, function_name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        id: "scripted".into(),
        created: 0,
        model: "mock".into(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::Assistant)),
                content: None,
                tool_calls: Some(vec![ChatToolCall {
                    id: call_id.to_string(),
                    function_name: function_name.to_string(),
                    arguments: arguments.to_string(),
                }]),
                tool_call_id: None,
            },
            finish_reason: FinishReason::ToolCalls,
        }],
        usage: ChatUsage::default(),
        iteration_limit_reached: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeats_last_response_once_the_queue_is_exhausted() {
        let provider = ScriptedLlmProvider::new(vec![text_response("first"), text_response("second")]);

        let a = provider.chat(ChatRequest::default()).await.unwrap();
        let b = provider.chat(ChatRequest::default()).await.unwrap();
        let c = provider.chat(ChatRequest::default()).await.unwrap();

        assert_eq!(a.choices[0].message.content.as_deref(), Some("first"));
        assert_eq!(b.choices[0].message.content.as_deref(), Some("second"));
        assert_eq!(c.choices[0].message.content.as_deref(), Some("second"));
        assert_eq!(provider.call_count().await, 3);
    }
}
