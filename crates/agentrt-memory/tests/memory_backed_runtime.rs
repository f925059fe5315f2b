// Cross-module scenario: `MemoryPortAdapter` bridges a live
// `InProcessMemoryStore` into `RuntimeManager`'s narrow `MemoryPort` seam, so
// a prior turn stored in memory actually reaches the next chat request as
// context. Exercises agentrt-memory and agentrt-core together rather than
// either crate's unit tests in isolation.

use agentrt_contracts::agent::{Agent, AgentConfig, AgentStatus, AgentType, LlmBinding, MemoryPolicy};
use agentrt_core::test_support::{text_response, ScriptedLlmProvider};
use agentrt_core::{ChatRequest, EventBus, ProviderFactory, RuntimeManager, SkillRegistry, ToolRegistry};
use agentrt_memory::port::MemoryPortAdapter;
use agentrt_memory::{HashEmbeddingProvider, InProcessMemoryStore, MemoryStore};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn sample_agent() -> Agent {
    let now = chrono::Utc::now();
    Agent {
        id: Uuid::now_v7(),
        owner_id: Uuid::now_v7(),
        public: false,
        name: "memory-backed-agent".into(),
        description: None,
        avatar_url: None,
        agent_type: AgentType::Assistant,
        status: AgentStatus::Idle,
        config: AgentConfig {
            model: "gpt-4o".into(),
            temperature: None,
            max_output_tokens: None,
            system_prompt: String::new(),
            welcome_message: None,
            enabled_tools: Vec::new(),
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

#[tokio::test]
async fn recent_memories_are_injected_as_context_on_the_next_chat() {
    let events = Arc::new(EventBus::new());
    let memory = Arc::new(InProcessMemoryStore::new(
        Arc::new(HashEmbeddingProvider::default()),
        events.clone(),
    ));
    let agent = sample_agent();
    let session_id = Uuid::now_v7();

    memory
        .store_message(agent.id, session_id, "user", "remember that the sky is blue", None)
        .await
        .unwrap();
    memory
        .store_message(agent.id, session_id, "assistant", "noted, the sky is blue", None)
        .await
        .unwrap();

    let provider = Arc::new(ScriptedLlmProvider::new(vec![text_response("got it")]));
    let mut factory = ProviderFactory::new();
    factory.register("mock", provider.clone());

    let manager = Arc::new(RuntimeManager::new(
        Arc::new(ToolRegistry::new()),
        Arc::new(SkillRegistry::new()),
        Arc::new(factory),
        Arc::new(MemoryPortAdapter::new(memory)),
        events,
    ));
    let runtime_id = manager.initialize_runtime(&agent).await;

    manager
        .chat(runtime_id, ChatRequest::default(), Some(session_id), None)
        .await
        .unwrap();

    let sent = provider.calls().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .messages
        .iter()
        .any(|m| m.content.as_deref() == Some("remember that the sky is blue")));
    assert!(sent[0]
        .messages
        .iter()
        .any(|m| m.content.as_deref() == Some("noted, the sky is blue")));
}
