// End-to-end chat scenarios against a scripted LLM provider: plain chat with
// no tools, a successful tool round trip, and a tool failure the loop
// recovers from. Mirrors the teacher's `everruns-core/tests/tool_calling_test.rs`
// layout: concrete public types, fixtures built inline per test.

use agentrt_contracts::agent::{Agent, AgentConfig, AgentStatus, AgentType, LlmBinding, MemoryPolicy};
use agentrt_contracts::events::EventFilter;
use agentrt_contracts::tools::ToolContext;
use agentrt_core::builtin_tools::CalculatorTool;
use agentrt_core::error::Result;
use agentrt_core::memory_port::NullMemoryPort;
use agentrt_core::llm::ChatRoleOrNone;
use agentrt_core::test_support::{text_response, tool_call_response, ScriptedLlmProvider};
use agentrt_core::tools::{Tool, ToolExecutionResult, ToolRegistry};
use agentrt_core::{ChatRequest, EventBus, ProviderFactory, RuntimeManager, SkillRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn sample_agent(enabled_tools: Vec<String>) -> Agent {
    let now = chrono::Utc::now();
    Agent {
        id: Uuid::now_v7(),
        owner_id: Uuid::now_v7(),
        public: false,
        name: "scenario-agent".into(),
        description: None,
        avatar_url: None,
        agent_type: AgentType::Assistant,
        status: AgentStatus::Idle,
        config: AgentConfig {
            model: "gpt-4o".into(),
            temperature: None,
            max_output_tokens: None,
            system_prompt: "You are a terse assistant.".into(),
            welcome_message: None,
            enabled_tools,
            enabled_skills: Vec::new(),
            memory_policy: MemoryPolicy::default(),
            llm: LlmBinding {
                provider: "mock".into(),
                api_key: None,
                base_url: None,
            },
            settings: HashMap::new(),
        },
        deleted: false,
        created_at: now,
        updated_at: now,
    }
}

fn user_message(text: &str) -> agentrt_core::llm::ChatMessage {
    agentrt_core::llm::ChatMessage {
        role: ChatRoleOrNone(Some(agentrt_core::llm::ChatRole::User)),
        content: Some(text.to_string()),
        tool_calls: None,
        tool_call_id: None,
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, _input: Value, _context: &ToolContext) -> ToolExecutionResult {
        ToolExecutionResult::tool_error("boom")
    }
}

fn build_manager(
    provider: Arc<ScriptedLlmProvider>,
    tools: ToolRegistry,
) -> (Arc<RuntimeManager>, Arc<EventBus>) {
    let mut factory = ProviderFactory::new();
    factory.register("mock", provider);
    let events = Arc::new(EventBus::new());
    let manager = Arc::new(RuntimeManager::new(
        Arc::new(tools),
        Arc::new(SkillRegistry::new()),
        Arc::new(factory),
        Arc::new(NullMemoryPort),
        events.clone(),
    ));
    (manager, events)
}

#[tokio::test]
async fn plain_chat_with_no_tools_returns_the_providers_text() -> Result<()> {
    let provider = Arc::new(ScriptedLlmProvider::new(vec![text_response("Hi there!")]));
    let (manager, events) = build_manager(provider.clone(), ToolRegistry::new());
    let agent = sample_agent(Vec::new());
    let runtime_id = manager.initialize_runtime(&agent).await;

    let request = ChatRequest {
        messages: vec![user_message("Hello")],
        ..Default::default()
    };
    let response = manager.chat(runtime_id, request, None, None).await?;

    assert_eq!(response.choices[0].message.content.as_deref(), Some("Hi there!"));
    assert_eq!(provider.call_count().await, 1);

    let history = events.history(Some(&EventFilter { agent_id: Some(agent.id), session_id: None }), 100).await;
    let types: Vec<&str> = history.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"chat.started"));
    assert!(types.contains(&"chat.completed"));
    assert!(!types.iter().any(|t| t.starts_with("tool.")));
    Ok(())
}

#[tokio::test]
async fn tool_round_trip_success_feeds_the_output_back_to_the_model() -> Result<()> {
    let provider = Arc::new(ScriptedLlmProvider::new(vec![
        tool_call_response("call_1", "calculator", r#"{"expression":"2+2"}"#),
        text_response("The answer is 4"),
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);
    let (manager, events) = build_manager(provider.clone(), tools);
    let agent = sample_agent(vec!["calculator".to_string()]);
    let runtime_id = manager.initialize_runtime(&agent).await;

    let request = ChatRequest {
        messages: vec![user_message("What's 2+2?")],
        ..Default::default()
    };
    let response = manager.chat(runtime_id, request, None, None).await?;

    assert_eq!(response.choices[0].message.content.as_deref(), Some("The answer is 4"));
    assert_eq!(provider.call_count().await, 2);

    let history = events.history(Some(&EventFilter { agent_id: Some(agent.id), session_id: None }), 100).await;
    let completed = history
        .iter()
        .find(|e| e.event_type == "tool.completed")
        .expect("tool.completed event was emitted");
    assert_eq!(completed.payload["output"]["result"].as_f64(), Some(4.0));
    Ok(())
}

#[tokio::test]
async fn tool_failure_is_recovered_by_the_next_turn() -> Result<()> {
    let provider = Arc::new(ScriptedLlmProvider::new(vec![
        tool_call_response("call_1", "failing", "{}"),
        text_response("looks like that tool failed, here's what I know anyway"),
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(FailingTool);
    let (manager, events) = build_manager(provider.clone(), tools);
    let agent = sample_agent(vec!["failing".to_string()]);
    let runtime_id = manager.initialize_runtime(&agent).await;

    let request = ChatRequest {
        messages: vec![user_message("try the failing tool")],
        ..Default::default()
    };
    let response = manager.chat(runtime_id, request, None, None).await?;

    assert_eq!(
        response.choices[0].message.content.as_deref(),
        Some("looks like that tool failed, here's what I know anyway")
    );
    assert_eq!(provider.call_count().await, 2);

    let history = events.history(Some(&EventFilter { agent_id: Some(agent.id), session_id: None }), 100).await;
    let failed = history
        .iter()
        .find(|e| e.event_type == "tool.failed")
        .expect("tool.failed event was emitted");
    assert_eq!(failed.payload["error"].as_str(), Some("boom"));
    assert!(matches!(response.choices[0].finish_reason, agentrt_core::llm::FinishReason::Stop));
    Ok(())
}
