// Anthropic Messages API adapter. The system message is lifted out of the
// turn list into the top-level `system` field; tool results are sent back
// as user messages carrying `tool_result` blocks, matching how the Messages
// API represents a ReAct-style tool loop.

use agentrt_core::error::{Result, RuntimeError};
use agentrt_core::llm::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatRoleOrNone, ChatStream,
    ChatStreamChunk, ChatToolCall, ChatUsage, FinishReason, LlmProvider,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| RuntimeError::bad_request("ANTHROPIC_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_url", &self.api_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

/// Splits a flat message list into Anthropic's (system, turns) shape.
/// Tool-role messages become user turns carrying a `tool_result` block;
/// assistant tool calls become `tool_use` blocks appended to that turn.
fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
    let mut system = None;
    let mut turns = Vec::new();

    for msg in messages {
        match msg.role.0 {
            Some(ChatRole::System) => {
                system = msg.content.clone();
            }
            Some(ChatRole::Tool) => {
                if let Some(tool_call_id) = &msg.tool_call_id {
                    turns.push(WireMessage {
                        role: "user".to_string(),
                        content: vec![WireContentBlock::ToolResult {
                            tool_use_id: tool_call_id.clone(),
                            content: msg.content.clone().unwrap_or_default(),
                            is_error: None,
                        }],
                    });
                }
            }
            Some(ChatRole::Assistant) => {
                let mut content = Vec::new();
                if let Some(text) = &msg.content {
                    if !text.is_empty() {
                        content.push(WireContentBlock::Text { text: text.clone() });
                    }
                }
                if let Some(tool_calls) = &msg.tool_calls {
                    for call in tool_calls {
                        let input: Value = serde_json::from_str(&call.arguments).unwrap_or(json!({}));
                        content.push(WireContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.function_name.clone(),
                            input,
                        });
                    }
                }
                turns.push(WireMessage { role: "assistant".to_string(), content });
            }
            Some(ChatRole::User) | None => {
                turns.push(WireMessage {
                    role: "user".to_string(),
                    content: vec![WireContentBlock::Text { text: msg.content.clone().unwrap_or_default() }],
                });
            }
        }
    }

    (system, turns)
}

fn convert_tools(request: &ChatRequest) -> Option<Vec<WireTool>> {
    if request.tools.is_empty() {
        return None;
    }
    Some(
        request
            .tools
            .iter()
            .map(|t| WireTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect(),
    )
}

fn build_request(request: &ChatRequest, stream: bool) -> WireRequest {
    let (system, messages) = convert_messages(&request.messages);
    WireRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS).max(1),
        temperature: request.temperature,
        system,
        stream,
        tools: convert_tools(request),
    }
}

fn stop_reason_to_finish(reason: &str) -> FinishReason {
    match reason {
        "tool_use" => FinishReason::ToolCalls,
        "max_tokens" => FinishReason::Length,
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        _ => FinishReason::Null,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let wire_request = build_request(&request, false);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::llm_upstream(format!("anthropic error {status}: {body}")));
        }

        let body: WireMessageResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("invalid response body: {e}")))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in body.content {
            match block {
                WireContentBlock::Text { text: t } => text.push_str(&t),
                WireContentBlock::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                    id,
                    function_name: name,
                    arguments: input.to_string(),
                }),
                WireContentBlock::ToolResult { .. } => {}
            }
        }

        let finish_reason = body
            .stop_reason
            .as_deref()
            .map(stop_reason_to_finish)
            .unwrap_or(FinishReason::Stop);

        Ok(ChatResponse {
            id: body.id,
            created: chrono::Utc::now().timestamp(),
            model: body.model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: ChatRoleOrNone(Some(ChatRole::Assistant)),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                },
                finish_reason,
            }],
            usage: ChatUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                total_tokens: body.usage.input_tokens + body.usage.output_tokens,
            },
            iteration_limit_reached: false,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let wire_request = build_request(&request, true);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| RuntimeError::llm_upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::llm_upstream(format!("anthropic error {status}: {body}")));
        }

        // Tool-use blocks stream by index: content_block_start carries id and
        // name, subsequent input_json_delta chunks for that index carry only
        // partial JSON, so we track in-flight calls per index.
        let pending_tool_calls: Arc<Mutex<HashMap<u32, (String, String)>>> = Arc::new(Mutex::new(HashMap::new()));

        let event_stream = response.bytes_stream().eventsource();
        let translated = event_stream.filter_map(move |event| {
            let pending_tool_calls = Arc::clone(&pending_tool_calls);
            async move {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => return Some(Err(RuntimeError::llm_upstream(format!("stream error: {e}")))),
                };

                match event.event.as_str() {
                    "content_block_start" => {
                        let data: WireContentBlockStart = match serde_json::from_str(&event.data) {
                            Ok(d) => d,
                            Err(_) => return None,
                        };
                        if let WireContentBlockStartKind::ToolUse { id, name } = data.content_block {
                            pending_tool_calls.lock().unwrap().insert(data.index, (id, name));
                        }
                        None
                    }
                    "content_block_delta" => {
                        let data: WireContentBlockDeltaEvent = match serde_json::from_str(&event.data) {
                            Ok(d) => d,
                            Err(_) => return None,
                        };
                        match data.delta {
                            WireDelta::TextDelta { text } => Some(Ok(ChatStreamChunk {
                                delta: ChatMessage { content: Some(text), ..Default::default() },
                                finish_reason: None,
                            })),
                            WireDelta::InputJsonDelta { partial_json } => {
                                let map = pending_tool_calls.lock().unwrap();
                                let (id, name) = map.get(&data.index).cloned().unwrap_or_default();
                                Some(Ok(ChatStreamChunk {
                                    delta: ChatMessage {
                                        tool_calls: Some(vec![ChatToolCall {
                                            id,
                                            function_name: name,
                                            arguments: partial_json,
                                        }]),
                                        ..Default::default()
                                    },
                                    finish_reason: None,
                                }))
                            }
                        }
                    }
                    "message_delta" => {
                        let data: WireMessageDelta = match serde_json::from_str(&event.data) {
                            Ok(d) => d,
                            Err(_) => return None,
                        };
                        data.delta.stop_reason.map(|reason| {
                            Ok(ChatStreamChunk {
                                delta: ChatMessage::default(),
                                finish_reason: Some(stop_reason_to_finish(&reason)),
                            })
                        })
                    }
                    "message_stop" | "content_block_stop" | "message_start" | "ping" => None,
                    "error" => Some(Err(RuntimeError::llm_upstream(format!("anthropic stream error: {}", event.data)))),
                    _ => None,
                }
            }
        });

        Ok(Box::pin(translated))
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: Vec<WireContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct WireMessageResponse {
    id: String,
    model: String,
    content: Vec<WireContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireContentBlockStart {
    index: u32,
    content_block: WireContentBlockStartKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireContentBlockStartKind {
    #[serde(rename = "text")]
    Text {},
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
}

#[derive(Debug, Deserialize)]
struct WireContentBlockDeltaEvent {
    index: u32,
    delta: WireDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct WireMessageDelta {
    delta: WireMessageDeltaData,
}

#[derive(Debug, Deserialize)]
struct WireMessageDeltaData {
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_is_lifted_out_of_the_turn_list() {
        let messages = vec![
            ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::System)),
                content: Some("be terse".into()),
                ..Default::default()
            },
            ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::User)),
                content: Some("hi".into()),
                ..Default::default()
            },
        ];
        let (system, turns) = convert_messages(&messages);
        assert_eq!(system, Some("be terse".to_string()));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, "user");
    }

    #[test]
    fn tool_result_message_becomes_a_user_turn() {
        let messages = vec![ChatMessage {
            role: ChatRoleOrNone(Some(ChatRole::Tool)),
            content: Some("42".into()),
            tool_call_id: Some("call_1".into()),
            ..Default::default()
        }];
        let (_, turns) = convert_messages(&messages);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, "user");
        matches!(&turns[0].content[0], WireContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1");
    }

    #[test]
    fn stop_reason_maps_tool_use_to_tool_calls() {
        assert_eq!(stop_reason_to_finish("tool_use"), FinishReason::ToolCalls);
        assert_eq!(stop_reason_to_finish("end_turn"), FinishReason::Stop);
    }
}
