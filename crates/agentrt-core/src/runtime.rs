// AgentRuntime + RuntimeManager: the per-agent execution context, its
// single-flight lock, idle eviction, and the agentic tool-call loop around
// a streaming LLM provider.

use crate::error::{Result, RuntimeError};
use crate::events::EventBus;
use crate::llm::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatRoleOrNone, ChatStream,
    ChatStreamChunk, ToolCallAccumulator,
};
use crate::memory_port::MemoryPort;
use crate::provider_factory::ProviderFactory;
use crate::skills::Skill;
use crate::tools::Tool;
use agentrt_contracts::agent::Agent;
use agentrt_contracts::events::{Event, EventMetadata};
use agentrt_contracts::skills::{SkillContext, SkillOutcome};
use agentrt_contracts::tools::{ToolContext, ToolOutcome};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_ITERATIONS: usize = 10;
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Initializing,
    Ready,
    Executing,
    Error,
}

/// An in-memory object bound to one Agent snapshot: resolved tools/skills
/// and the state machine. Owned exclusively by `RuntimeManager`.
pub struct AgentRuntime {
    pub runtime_id: Uuid,
    pub agent: Agent,
    state: RwLock<RuntimeState>,
    tools: HashMap<String, Arc<dyn Tool>>,
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl AgentRuntime {
    fn initialize(runtime_id: Uuid, agent: Agent, tools: HashMap<String, Arc<dyn Tool>>, skills: HashMap<String, Arc<dyn Skill>>) -> Self {
        Self {
            runtime_id,
            agent,
            state: RwLock::new(RuntimeState::Ready),
            tools,
            skills,
        }
    }

    pub async fn state(&self) -> RuntimeState {
        *self.state.read().await
    }

    async fn set_state(&self, state: RuntimeState) {
        *self.state.write().await = state;
    }

    fn tool_definitions(&self) -> Vec<agentrt_contracts::tools::ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    async fn invoke_tool(&self, name: &str, input: Value, context: &ToolContext) -> ToolOutcome {
        match self.tools.get(name) {
            Some(tool) => tool.execute(input, context).await.into_outcome(name),
            None => ToolOutcome::err(format!("tool not enabled on this agent: {name}")),
        }
    }

    async fn invoke_skill(&self, id: &str, input: Value, context: &SkillContext) -> SkillOutcome {
        match self.skills.get(id) {
            Some(skill) => skill.execute(input, context).await.into_outcome(id, skill.name(), context),
            None => {
                use crate::skills::SkillExecutionResult;
                SkillExecutionResult::failure(format!("skill not enabled on this agent: {id}"))
                    .into_outcome(id, id, context)
            }
        }
    }
}

struct ManagedRuntime {
    runtime: AgentRuntime,
    agent_id: Uuid,
    lock: Arc<Mutex<()>>,
    last_used_at: RwLock<Instant>,
}

/// Owns the runtimeId -> Runtime mapping, the per-runtime single-flight
/// lock, and the idle sweeper.
pub struct RuntimeManager {
    runtimes: RwLock<HashMap<Uuid, Arc<ManagedRuntime>>>,
    by_agent: RwLock<HashMap<Uuid, Uuid>>,
    tool_registry: Arc<crate::tools::ToolRegistry>,
    skill_registry: Arc<crate::skills::SkillRegistry>,
    providers: Arc<ProviderFactory>,
    memory: Arc<dyn MemoryPort>,
    events: Arc<EventBus>,
    ttl: Duration,
    lock_timeout: Duration,
}

impl RuntimeManager {
    pub fn new(
        tool_registry: Arc<crate::tools::ToolRegistry>,
        skill_registry: Arc<crate::skills::SkillRegistry>,
        providers: Arc<ProviderFactory>,
        memory: Arc<dyn MemoryPort>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            runtimes: RwLock::new(HashMap::new()),
            by_agent: RwLock::new(HashMap::new()),
            tool_registry,
            skill_registry,
            providers,
            memory,
            events,
            ttl: DEFAULT_TTL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Spawn the idle-eviction sweeper. Keep the returned handle alive for
    /// the process lifetime; dropping it aborts the sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                manager.sweep_once().await;
            }
        })
    }

    async fn sweep_once(&self) {
        let candidates: Vec<Uuid> = self.runtimes.read().await.keys().copied().collect();
        for runtime_id in candidates {
            let managed = match self.runtimes.read().await.get(&runtime_id).cloned() {
                Some(m) => m,
                None => continue,
            };
            if managed.last_used_at.read().await.elapsed() < self.ttl {
                continue;
            }
            // Non-blocking: a runtime currently mid-call is skipped, not waited on.
            if let Ok(_guard) = managed.lock.clone().try_lock_owned() {
                info!(runtime_id = %runtime_id, "evicting idle runtime");
                self.destroy_runtime(runtime_id).await;
            }
        }
    }

    /// Returns the current runtime id for this agent, creating one if
    /// absent or previously evicted.
    pub async fn ensure_runtime(&self, agent: &Agent) -> Uuid {
        if let Some(&runtime_id) = self.by_agent.read().await.get(&agent.id) {
            if self.runtimes.read().await.contains_key(&runtime_id) {
                return runtime_id;
            }
        }
        self.initialize_runtime(agent).await
    }

    pub async fn initialize_runtime(&self, agent: &Agent) -> Uuid {
        let tools = self.tool_registry.resolve(&agent.config.enabled_tools);
        let skills = self.skill_registry.resolve(&agent.config.enabled_skills);
        let runtime_id = Uuid::now_v7();
        let managed = Arc::new(ManagedRuntime {
            runtime: AgentRuntime::initialize(runtime_id, agent.clone(), tools, skills),
            agent_id: agent.id,
            lock: Arc::new(Mutex::new(())),
            last_used_at: RwLock::new(Instant::now()),
        });
        self.runtimes.write().await.insert(runtime_id, managed);
        self.by_agent.write().await.insert(agent.id, runtime_id);
        self.events
            .emit(Event::new(
                "agent.initialized",
                json!({ "runtime_id": runtime_id }),
                EventMetadata {
                    agent_id: agent.id,
                    session_id: None,
                    execution_id: None,
                    user_id: None,
                },
            ))
            .await;
        runtime_id
    }

    /// Current runtime id bound to this agent, if one is live.
    pub async fn runtime_for_agent(&self, agent_id: Uuid) -> Option<Uuid> {
        self.by_agent.read().await.get(&agent_id).copied()
    }

    pub async fn destroy_runtime(&self, runtime_id: Uuid) {
        let removed = self.runtimes.write().await.remove(&runtime_id);
        if let Some(managed) = removed {
            self.by_agent.write().await.remove(&managed.agent_id);
            self.events
                .emit(Event::new(
                    "agent.destroyed",
                    json!({ "runtime_id": runtime_id }),
                    EventMetadata {
                        agent_id: managed.agent_id,
                        session_id: None,
                        execution_id: None,
                        user_id: None,
                    },
                ))
                .await;
        }
    }

    /// Acquire the runtime's single-flight lock with a hard timeout,
    /// validate it is `ready`, and transition it to `executing`.
    async fn acquire(&self, runtime_id: Uuid) -> Result<(Arc<ManagedRuntime>, OwnedMutexGuard<()>)> {
        let managed = self
            .runtimes
            .read()
            .await
            .get(&runtime_id)
            .cloned()
            .ok_or_else(|| RuntimeError::runtime_not_found(runtime_id))?;

        let lock = managed.lock.clone();
        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| RuntimeError::runtime_busy(runtime_id.to_string()))?;

        if managed.runtime.state().await != RuntimeState::Ready {
            return Err(RuntimeError::runtime_not_ready(runtime_id.to_string()));
        }
        managed.runtime.set_state(RuntimeState::Executing).await;
        *managed.last_used_at.write().await = Instant::now();
        Ok((managed, guard))
    }

    fn provider_for(&self, managed: &ManagedRuntime) -> Result<Arc<dyn crate::llm::LlmProvider>> {
        self.providers
            .get(&managed.runtime.agent.config.llm.provider)
            .ok_or_else(|| RuntimeError::llm_upstream("no LLM provider configured"))
    }

    async fn recent_memory_messages(&self, managed: &ManagedRuntime) -> Result<Vec<ChatMessage>> {
        let limit = managed.runtime.agent.config.memory_policy.recent_memory_limit;
        let recent = self
            .memory
            .get_recent_memories(managed.agent_id, limit)
            .await?;
        Ok(recent
            .into_iter()
            .map(|m| ChatMessage {
                role: ChatRoleOrNone(Some(role_from_str(&m.role))),
                content: Some(m.content),
                tool_calls: None,
                tool_call_id: None,
            })
            .collect())
    }

    fn build_base_messages(&self, managed: &ManagedRuntime) -> Vec<ChatMessage> {
        let prompt = &managed.runtime.agent.config.system_prompt;
        if prompt.is_empty() {
            Vec::new()
        } else {
            vec![ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::System)),
                content: Some(prompt.clone()),
                tool_calls: None,
                tool_call_id: None,
            }]
        }
    }

    fn normalize(&self, managed: &ManagedRuntime, mut request: ChatRequest, messages: Vec<ChatMessage>) -> ChatRequest {
        let config = &managed.runtime.agent.config;
        request.messages = messages;
        request.model = config.model.clone();
        request.temperature = config.temperature.or(request.temperature);
        request.max_tokens = config.max_output_tokens.or(request.max_tokens);
        request.tools = managed.runtime.tool_definitions();
        request
    }

    /// `chat(runtimeId, request, sessionId?, userId?)` per the runtime contract.
    pub async fn chat(
        &self,
        runtime_id: Uuid,
        request: ChatRequest,
        session_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<ChatResponse> {
        let (managed, _guard) = self.acquire(runtime_id).await?;

        self.emit_lifecycle(&managed, "chat.started", session_id, None, user_id, json!({}))
            .await;

        let result = self
            .run_agentic_loop(&managed, request, session_id, user_id)
            .await;

        managed.runtime.set_state(RuntimeState::Ready).await;
        match &result {
            Ok(response) => {
                self.emit_lifecycle(
                    &managed,
                    "chat.completed",
                    session_id,
                    None,
                    user_id,
                    json!({ "iteration_limit_reached": response.iteration_limit_reached }),
                )
                .await;
            }
            Err(e) => {
                self.emit_lifecycle(
                    &managed,
                    "chat.error",
                    session_id,
                    None,
                    user_id,
                    json!({ "error": e.to_string(), "code": e.code() }),
                )
                .await;
            }
        }
        result
    }

    async fn run_agentic_loop(
        &self,
        managed: &ManagedRuntime,
        request: ChatRequest,
        session_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<ChatResponse> {
        let provider = self.provider_for(managed)?;
        let mut messages = self.build_base_messages(managed);
        messages.extend(self.recent_memory_messages(managed).await?);
        messages.extend(request.messages.clone());

        let tool_context = ToolContext {
            agent_id: managed.agent_id,
            session_id,
            user_id,
        };

        let mut iterations = 0usize;
        loop {
            let normalized = self.normalize(managed, request.clone(), messages.clone());
            let response = provider
                .chat(normalized)
                .await
                .map_err(|e| RuntimeError::llm_upstream(e.to_string()))?;
            let choice = response
                .choices
                .first()
                .cloned()
                .ok_or_else(|| RuntimeError::llm_upstream("empty choices in provider response"))?;

            let tool_calls = choice
                .message
                .tool_calls
                .clone()
                .filter(|calls| !calls.is_empty());

            let Some(tool_calls) = tool_calls else {
                return Ok(response);
            };

            iterations += 1;
            let mut assistant_message = choice.message.clone();
            if assistant_message.role.0.is_none() {
                assistant_message.role = ChatRoleOrNone(Some(ChatRole::Assistant));
            }
            messages.push(assistant_message);

            for call in &tool_calls {
                let tool_message = self
                    .invoke_tool_call(managed, &tool_context, call, session_id, user_id)
                    .await;
                messages.push(tool_message);
            }

            if iterations >= MAX_ITERATIONS {
                let mut limited = response;
                limited.iteration_limit_reached = true;
                return Ok(limited);
            }
        }
    }

    async fn invoke_tool_call(
        &self,
        managed: &ManagedRuntime,
        context: &ToolContext,
        call: &crate::llm::ChatToolCall,
        session_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> ChatMessage {
        let parsed: std::result::Result<Value, _> = serde_json::from_str(&call.arguments);
        let outcome = match parsed {
            Ok(input) => {
                self.emit_lifecycle(
                    managed,
                    "tool.invoking",
                    session_id,
                    None,
                    user_id,
                    json!({ "tool_name": call.function_name, "call_id": call.id }),
                )
                .await;
                let outcome = managed.runtime.invoke_tool(&call.function_name, input, context).await;
                let event_type = if outcome.is_success() { "tool.completed" } else { "tool.failed" };
                let payload = match &outcome {
                    ToolOutcome::Success { output, .. } => {
                        json!({ "tool_name": call.function_name, "call_id": call.id, "output": output })
                    }
                    ToolOutcome::Failure { error, .. } => {
                        json!({ "tool_name": call.function_name, "call_id": call.id, "error": error })
                    }
                };
                self.emit_lifecycle(managed, event_type, session_id, None, user_id, payload).await;
                outcome
            }
            Err(e) => {
                warn!(tool_name = %call.function_name, error = %e, "tool arguments failed to parse");
                self.emit_lifecycle(
                    managed,
                    "tool.failed",
                    session_id,
                    None,
                    user_id,
                    json!({ "tool_name": call.function_name, "call_id": call.id, "error": "invalid arguments" }),
                )
                .await;
                ToolOutcome::err("invalid tool arguments: not valid JSON")
            }
        };

        let content = match &outcome {
            ToolOutcome::Success { output, .. } => output.to_string(),
            ToolOutcome::Failure { error, .. } => json!({ "error": error }).to_string(),
        };

        ChatMessage {
            role: ChatRoleOrNone(Some(ChatRole::Tool)),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(call.id.clone()),
        }
    }

    async fn emit_lifecycle(
        &self,
        managed: &ManagedRuntime,
        event_type: &str,
        session_id: Option<Uuid>,
        execution_id: Option<Uuid>,
        user_id: Option<Uuid>,
        payload: Value,
    ) {
        self.events
            .emit(Event::new(
                event_type,
                payload,
                EventMetadata {
                    agent_id: managed.agent_id,
                    session_id,
                    execution_id,
                    user_id,
                },
            ))
            .await;
    }

    /// `chatStream(runtimeId, request, sessionId?, userId?)`: mirrors `chat`
    /// but yields `ChatStreamChunk`s, accumulating tool-call deltas across
    /// the primary stream and opening a continuation stream after tool
    /// execution. The lock is held by the spawned task and released when it
    /// exits, including on early exit from a cancelled consumer.
    pub async fn chat_stream(
        &self,
        runtime_id: Uuid,
        request: ChatRequest,
        session_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<ChatStream> {
        let (managed, guard) = self.acquire(runtime_id).await?;
        let provider = self.provider_for(&managed)?;

        let mut messages = self.build_base_messages(&managed);
        messages.extend(self.recent_memory_messages(&managed).await?);
        messages.extend(request.messages.clone());

        let events = self.events.clone();
        let (tx, rx) = mpsc::channel::<Result<ChatStreamChunk>>(STREAM_CHANNEL_CAPACITY);

        self.emit_lifecycle(&managed, "chat.started", session_id, None, user_id, json!({}))
            .await;

        tokio::spawn(async move {
            let _guard = guard;
            let outcome = drive_chat_stream(
                managed.clone(),
                provider,
                request,
                messages,
                session_id,
                user_id,
                events.clone(),
                tx.clone(),
            )
            .await;

            managed.runtime.set_state(RuntimeState::Ready).await;
            match outcome {
                Ok(()) => {
                    events
                        .emit(Event::new(
                            "chat.completed",
                            json!({}),
                            EventMetadata {
                                agent_id: managed.agent_id,
                                session_id,
                                execution_id: None,
                                user_id,
                            },
                        ))
                        .await;
                }
                Err(e) => {
                    let _ = tx.send(Err(RuntimeError::llm_upstream(e.to_string()))).await;
                    events
                        .emit(Event::new(
                            "chat.error",
                            json!({ "error": e.to_string() }),
                            EventMetadata {
                                agent_id: managed.agent_id,
                                session_id,
                                execution_id: None,
                                user_id,
                            },
                        ))
                        .await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// `executeSkill(runtimeId, skillId, input, ...)`.
    pub async fn execute_skill(
        &self,
        runtime_id: Uuid,
        skill_id: &str,
        input: Value,
        session_id: Option<Uuid>,
    ) -> Result<SkillOutcome> {
        let (managed, _guard) = self.acquire(runtime_id).await?;
        let execution_id = Uuid::now_v7();

        self.emit_lifecycle(
            &managed,
            "skill.invoking",
            session_id,
            Some(execution_id),
            None,
            json!({ "skill_id": skill_id }),
        )
        .await;

        let context = SkillContext {
            execution_id,
            agent_id: managed.agent_id,
            session_id,
            started_at: chrono::Utc::now(),
        };
        let outcome = managed.runtime.invoke_skill(skill_id, input, &context).await;
        managed.runtime.set_state(RuntimeState::Ready).await;

        let event_type = if outcome.is_success() { "skill.completed" } else { "skill.failed" };
        self.emit_lifecycle(
            &managed,
            event_type,
            session_id,
            Some(execution_id),
            None,
            json!({ "skill_id": skill_id }),
        )
        .await;

        Ok(outcome)
    }
}

fn role_from_str(role: &str) -> ChatRole {
    match role {
        "system" => ChatRole::System,
        "assistant" => ChatRole::Assistant,
        "tool" => ChatRole::Tool,
        _ => ChatRole::User,
    }
}

/// Drives one primary stream plus any tool-triggered continuation streams,
/// forwarding chunks to `tx` until exhaustion, an error, or the receiver
/// being dropped (consumer cancellation).
#[allow(clippy::too_many_arguments)]
async fn drive_chat_stream(
    managed: Arc<ManagedRuntime>,
    provider: Arc<dyn crate::llm::LlmProvider>,
    base_request: ChatRequest,
    mut messages: Vec<ChatMessage>,
    session_id: Option<Uuid>,
    user_id: Option<Uuid>,
    events: Arc<EventBus>,
    tx: mpsc::Sender<Result<ChatStreamChunk>>,
) -> anyhow::Result<()> {
    let tool_context = ToolContext {
        agent_id: managed.agent_id,
        session_id,
        user_id,
    };
    let mut iterations = 0usize;

    loop {
        let mut normalized = base_request.clone();
        normalized.messages = messages.clone();
        normalized.model = managed.runtime.agent.config.model.clone();
        normalized.tools = managed.runtime.tool_definitions();

        let mut stream = provider
            .chat_stream(normalized)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let mut accumulator = ToolCallAccumulator::new();
        let mut assistant_content = String::new();

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| anyhow::anyhow!(e.to_string()))?;
            if let Some(text) = &chunk.delta.content {
                assistant_content.push_str(text);
                events
                    .emit(Event::new(
                        "chat.stream",
                        json!({ "content": text }),
                        EventMetadata {
                            agent_id: managed.agent_id,
                            session_id,
                            execution_id: None,
                            user_id,
                        },
                    ))
                    .await;
            }
            if let Some(calls) = &chunk.delta.tool_calls {
                for call in calls {
                    accumulator.merge(call);
                }
            }
            if tx.send(Ok(chunk)).await.is_err() {
                // Consumer dropped the stream; stop driving it promptly.
                return Ok(());
            }
        }

        if accumulator.is_empty() {
            return Ok(());
        }

        iterations += 1;
        let calls = accumulator.into_calls();
        messages.push(ChatMessage {
            role: ChatRoleOrNone(Some(ChatRole::Assistant)),
            content: if assistant_content.is_empty() { None } else { Some(assistant_content) },
            tool_calls: Some(calls.clone()),
            tool_call_id: None,
        });

        for call in &calls {
            events
                .emit(Event::new(
                    "tool.invoking",
                    json!({ "tool_name": call.function_name, "call_id": call.id }),
                    EventMetadata {
                        agent_id: managed.agent_id,
                        session_id,
                        execution_id: None,
                        user_id,
                    },
                ))
                .await;

            let parsed: std::result::Result<Value, _> = serde_json::from_str(&call.arguments);
            let outcome = match parsed {
                Ok(input) => managed.runtime.invoke_tool(&call.function_name, input, &tool_context).await,
                Err(_) => ToolOutcome::err("invalid tool arguments: not valid JSON"),
            };
            let event_type = if outcome.is_success() { "tool.completed" } else { "tool.failed" };
            events
                .emit(Event::new(
                    event_type,
                    json!({ "tool_name": call.function_name, "call_id": call.id }),
                    EventMetadata {
                        agent_id: managed.agent_id,
                        session_id,
                        execution_id: None,
                        user_id,
                    },
                ))
                .await;

            let content = match &outcome {
                ToolOutcome::Success { output, .. } => output.to_string(),
                ToolOutcome::Failure { error, .. } => json!({ "error": error }).to_string(),
            };
            messages.push(ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::Tool)),
                content: Some(content),
                tool_calls: None,
                tool_call_id: Some(call.id.clone()),
            });
        }

        if iterations >= MAX_ITERATIONS {
            error!(runtime_id = %managed.runtime_id, "agentic stream loop hit iteration cap");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatChoice, ChatToolCall, ChatUsage, FinishReason, LlmProvider};
    use crate::skills::SkillRegistry;
    use crate::tools::ToolRegistry;
    use agentrt_contracts::agent::{AgentConfig, AgentStatus, AgentType, LlmBinding, MemoryPolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_agent() -> Agent {
        Agent {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            public: false,
            name: "test-agent".into(),
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
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn stub_message(content: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRoleOrNone(Some(ChatRole::Assistant)),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn stub_response(message: ChatMessage, finish: FinishReason) -> ChatResponse {
        ChatResponse {
            id: "resp".into(),
            created: 0,
            model: "mock".into(),
            choices: vec![ChatChoice { index: 0, message, finish_reason: finish }],
            usage: ChatUsage::default(),
            iteration_limit_reached: false,
        }
    }

    struct AlwaysToolCallProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for AlwaysToolCallProvider {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let message = ChatMessage {
                role: ChatRoleOrNone(Some(ChatRole::Assistant)),
                content: None,
                tool_calls: Some(vec![ChatToolCall {
                    id: "call_1".into(),
                    function_name: "noop".into(),
                    arguments: "{}".into(),
                }]),
                tool_call_id: None,
            };
            Ok(stub_response(message, FinishReason::ToolCalls))
        }
        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream> {
            unimplemented!()
        }
    }

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _input: Value, _context: &ToolContext) -> crate::tools::ToolExecutionResult {
            crate::tools::ToolExecutionResult::success(json!({"ok": true}))
        }
    }

    struct OverlapCheckingProvider {
        in_flight: Arc<AtomicUsize>,
        max_observed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for OverlapCheckingProvider {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(stub_response(stub_message("hi"), FinishReason::Stop))
        }
        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream> {
            unimplemented!()
        }
    }

    fn build_manager(provider: Arc<dyn LlmProvider>) -> (Arc<RuntimeManager>, Agent) {
        let mut tools = ToolRegistry::new();
        tools.register(NoopTool);
        let mut factory = ProviderFactory::new();
        factory.register("mock", provider);
        let manager = Arc::new(RuntimeManager::new(
            Arc::new(tools),
            Arc::new(SkillRegistry::new()),
            Arc::new(factory),
            Arc::new(crate::memory_port::NullMemoryPort),
            Arc::new(EventBus::new()),
        ));
        (manager, sample_agent())
    }

    #[tokio::test]
    async fn unknown_runtime_fails_not_found() {
        let (manager, _agent) = build_manager(Arc::new(OverlapCheckingProvider {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
        }));
        let result = manager.chat(Uuid::now_v7(), ChatRequest::default(), None, None).await;
        assert!(matches!(result, Err(RuntimeError::NotFound(_))));
    }

    #[tokio::test]
    async fn iteration_cap_returns_marked_response_after_ten_tool_turns() {
        let provider = Arc::new(AlwaysToolCallProvider { calls: AtomicUsize::new(0) });
        let (manager, agent) = build_manager(provider.clone());
        let runtime_id = manager.initialize_runtime(&agent).await;

        let response = manager
            .chat(runtime_id, ChatRequest::default(), None, None)
            .await
            .unwrap();

        assert!(response.iteration_limit_reached);
        assert_eq!(provider.calls.load(Ordering::SeqCst), MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn single_flight_serializes_concurrent_chat_calls() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(OverlapCheckingProvider {
            in_flight: in_flight.clone(),
            max_observed: max_observed.clone(),
        });
        let (manager, agent) = build_manager(provider);
        let runtime_id = manager.initialize_runtime(&agent).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.chat(runtime_id, ChatRequest::default(), None, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_runtime_past_ttl_is_evicted_by_sweep() {
        let agent = sample_agent();
        let manager = Arc::new(
            RuntimeManager::new(
                Arc::new(ToolRegistry::new()),
                Arc::new(SkillRegistry::new()),
                Arc::new(ProviderFactory::new()),
                Arc::new(crate::memory_port::NullMemoryPort),
                Arc::new(EventBus::new()),
            )
            .with_ttl(Duration::from_millis(10)),
        );
        let runtime_id = manager.initialize_runtime(&agent).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.sweep_once().await;

        let result = manager.chat(runtime_id, ChatRequest::default(), None, None).await;
        assert!(matches!(result, Err(RuntimeError::NotFound(_))));
    }
}
