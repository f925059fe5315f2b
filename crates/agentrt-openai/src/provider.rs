// OpenAI-compatible LlmProvider: chat completions, streamed or not, over
// the `/chat/completions` endpoint. Tool-call deltas carry a wire index
// that must be resolved to a stable id locally before merging upstream.

use agentrt_core::error::{Result, RuntimeError};
use agentrt_core::llm::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatRoleOrNone, ChatStream,
    ChatStreamChunk, ChatToolCall, ChatUsage, FinishReason, LlmProvider,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RuntimeError::bad_request("OPENAI_API_KEY is not set"))?;
        let provider = match std::env::var("OPENAI_BASE_URL") {
            Ok(base_url) => Self::with_base_url(api_key, base_url),
            Err(_) => Self::new(api_key),
        };
        Ok(provider)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

fn role_to_wire(role: &ChatRoleOrNone) -> &'static str {
    match role.0 {
        Some(ChatRole::System) => "system",
        Some(ChatRole::Assistant) => "assistant",
        Some(ChatRole::Tool) => "tool",
        Some(ChatRole::User) | None => "user",
    }
}

fn wire_role_to_chat(role: &str) -> ChatRole {
    match role {
        "system" => ChatRole::System,
        "assistant" => ChatRole::Assistant,
        "tool" => ChatRole::Tool,
        _ => ChatRole::User,
    }
}

fn to_wire_message(msg: &ChatMessage) -> WireMessage {
    WireMessage {
        role: role_to_wire(&msg.role).to_string(),
        content: msg.content.clone(),
        tool_calls: msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    r#type: "function".to_string(),
                    function: WireFunctionCall {
                        name: c.function_name.clone(),
                        arguments: c.arguments.clone(),
                    },
                })
                .collect()
        }),
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn to_wire_tools(request: &ChatRequest) -> Option<Vec<WireTool>> {
    if request.tools.is_empty() {
        return None;
    }
    Some(
        request
            .tools
            .iter()
            .map(|t| WireTool {
                r#type: "function".to_string(),
                function: WireFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect(),
    )
}

fn to_wire_request(request: &ChatRequest, stream: bool) -> WireRequest {
    WireRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_wire_message).collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream,
        tools: to_wire_tools(request),
    }
}

fn finish_reason_from_wire(reason: &str) -> FinishReason {
    match reason {
        "tool_calls" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "stop" => FinishReason::Stop,
        _ => FinishReason::Null,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let wire_request = to_wire_request(&request, false);

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::llm_upstream(format!("openai error {status}: {body}")));
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("invalid response body: {e}")))?;

        let choices = body
            .choices
            .into_iter()
            .map(|c| ChatChoice {
                index: c.index,
                message: ChatMessage {
                    role: ChatRoleOrNone(Some(wire_role_to_chat(&c.message.role))),
                    content: c.message.content,
                    tool_calls: c.message.tool_calls.map(|calls| {
                        calls
                            .into_iter()
                            .map(|tc| ChatToolCall {
                                id: tc.id,
                                function_name: tc.function.name,
                                arguments: tc.function.arguments,
                            })
                            .collect()
                    }),
                    tool_call_id: c.message.tool_call_id,
                },
                finish_reason: finish_reason_from_wire(&c.finish_reason),
            })
            .collect();

        Ok(ChatResponse {
            id: body.id,
            created: body.created,
            model: body.model,
            choices,
            usage: ChatUsage {
                prompt_tokens: body.usage.prompt_tokens,
                completion_tokens: body.usage.completion_tokens,
                total_tokens: body.usage.total_tokens,
            },
            iteration_limit_reached: false,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let wire_request = to_wire_request(&request, true);

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::llm_upstream(format!("openai error {status}: {body}")));
        }

        // Streaming deltas carry a wire `index`, not an id; only the first
        // chunk for a given tool call carries its id. This map resolves
        // later chunks back to the id the runtime's accumulator keys on.
        let id_by_index: Arc<Mutex<HashMap<u32, String>>> = Arc::new(Mutex::new(HashMap::new()));

        let event_stream = response.bytes_stream().eventsource();
        let translated = event_stream.filter_map(move |event| {
            let id_by_index = Arc::clone(&id_by_index);
            async move {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => return Some(Err(RuntimeError::llm_upstream(format!("stream error: {e}")))),
                };
                if event.data == "[DONE]" {
                    return None;
                }

                let chunk: WireStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(c) => c,
                    Err(e) => {
                        return Some(Err(RuntimeError::llm_upstream(format!("invalid chunk: {e}"))));
                    }
                };

                let Some(choice) = chunk.choices.into_iter().next() else {
                    return None;
                };

                let tool_calls = choice.delta.tool_calls.map(|calls| {
                    let mut map = id_by_index.lock().unwrap();
                    calls
                        .into_iter()
                        .map(|tc| {
                            if let Some(id) = &tc.id {
                                map.insert(tc.index, id.clone());
                            }
                            let id = map.get(&tc.index).cloned().unwrap_or_default();
                            ChatToolCall {
                                id,
                                function_name: tc.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                                arguments: tc.function.and_then(|f| f.arguments).unwrap_or_default(),
                            }
                        })
                        .collect::<Vec<_>>()
                });

                Some(Ok(ChatStreamChunk {
                    delta: ChatMessage {
                        role: ChatRoleOrNone(None),
                        content: choice.delta.content,
                        tool_calls,
                        tool_call_id: None,
                    },
                    finish_reason: choice.finish_reason.as_deref().map(finish_reason_from_wire),
                }))
            }
        });

        Ok(Box::pin(translated))
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    created: i64,
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    index: u32,
    message: WireMessage,
    finish_reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireStreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<WireStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct WireStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_maps_known_values() {
        assert_eq!(finish_reason_from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(finish_reason_from_wire("stop"), FinishReason::Stop);
        assert_eq!(finish_reason_from_wire("weird"), FinishReason::Null);
    }

    #[test]
    fn role_round_trips_through_wire_strings() {
        assert_eq!(role_to_wire(&ChatRoleOrNone(Some(ChatRole::Assistant))), "assistant");
        assert_eq!(wire_role_to_chat("assistant"), ChatRole::Assistant);
        assert_eq!(wire_role_to_chat("unknown"), ChatRole::User);
    }

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let provider = OpenAiProvider::with_base_url("key", "https://example.com/v1/");
        assert_eq!(provider.endpoint("chat/completions"), "https://example.com/v1/chat/completions");
    }
}
