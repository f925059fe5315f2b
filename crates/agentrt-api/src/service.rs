// Thin orchestrator over storage, the runtime manager, and the memory
// subsystem: agent/session/message CRUD plus the one non-trivial
// operation, sendMessage/streamMessage.

use crate::error::{ApiError, ApiResult};
use agentrt_contracts::agent::{Agent, AgentConfig, CreateAgentRequest, UpdateAgentRequest};
use agentrt_contracts::message::{AgentMessage, MessageContent, MessageRole};
use agentrt_contracts::session::{AgentSession, CreateSessionRequest};
use agentrt_contracts::skills::SkillDefinition;
use agentrt_contracts::tools::ToolDefinition;
use agentrt_core::error::RuntimeError;
use agentrt_core::llm::{ChatMessage, ChatRequest, ChatRole, ChatRoleOrNone, ChatStreamChunk};
use agentrt_core::{RuntimeManager, SkillRegistry, ToolRegistry};
use agentrt_memory::{InProcessMemoryStore, MemoryStore};
use agentrt_storage::repository::{CreateAgentInput, CreateMessageInput, UpdateAgentInput};
use agentrt_storage::Database;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub struct AgentService {
    db: Arc<Database>,
    runtimes: Arc<RuntimeManager>,
    memory: Arc<InProcessMemoryStore>,
    tool_registry: Arc<ToolRegistry>,
    skill_registry: Arc<SkillRegistry>,
}

impl AgentService {
    pub fn new(
        db: Arc<Database>,
        runtimes: Arc<RuntimeManager>,
        memory: Arc<InProcessMemoryStore>,
        tool_registry: Arc<ToolRegistry>,
        skill_registry: Arc<SkillRegistry>,
    ) -> Self {
        Self {
            db,
            runtimes,
            memory,
            tool_registry,
            skill_registry,
        }
    }

    pub async fn create_agent(&self, owner_id: Uuid, req: CreateAgentRequest) -> ApiResult<Agent> {
        if req.name.trim().is_empty() {
            return Err(RuntimeError::bad_request("agent name must not be empty").into());
        }
        let agent = self
            .db
            .create_agent(
                owner_id,
                CreateAgentInput {
                    name: req.name,
                    description: req.description,
                    avatar_url: req.avatar_url,
                    agent_type: req.agent_type,
                    public: req.public,
                    config: req.config,
                },
            )
            .await?;
        Ok(agent)
    }

    pub async fn get_agent(&self, id: Uuid) -> ApiResult<Agent> {
        Ok(self.db.get_agent(id).await?)
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> ApiResult<Vec<Agent>> {
        Ok(self.db.list_by_owner(owner_id).await?)
    }

    pub async fn list_public(&self) -> ApiResult<Vec<Agent>> {
        Ok(self.db.list_public().await?)
    }

    pub async fn update_agent(&self, id: Uuid, req: UpdateAgentRequest) -> ApiResult<Agent> {
        let agent = self
            .db
            .update_agent(
                id,
                UpdateAgentInput {
                    name: req.name,
                    description: req.description,
                    avatar_url: req.avatar_url,
                    public: req.public,
                    config: req.config,
                },
            )
            .await?;
        Ok(agent)
    }

    pub async fn delete_agent(&self, id: Uuid) -> ApiResult<()> {
        self.db.delete_agent(id).await?;
        if let Some(runtime_id) = self.runtimes.runtime_for_agent(id).await {
            self.runtimes.destroy_runtime(runtime_id).await;
        }
        Ok(())
    }

    pub async fn create_session(
        &self,
        agent_id: Uuid,
        user_id: Uuid,
        req: CreateSessionRequest,
    ) -> ApiResult<AgentSession> {
        self.db.get_agent(agent_id).await?;
        Ok(self.db.create_session(agent_id, user_id, req).await?)
    }

    pub async fn get_session(&self, id: Uuid) -> ApiResult<AgentSession> {
        Ok(self.db.get_session(id).await?)
    }

    pub async fn list_sessions(&self, agent_id: Uuid) -> ApiResult<Vec<AgentSession>> {
        Ok(self.db.list_sessions_for_agent(agent_id).await?)
    }

    pub async fn delete_session(&self, id: Uuid) -> ApiResult<()> {
        Ok(self.db.delete_session(id).await?)
    }

    pub async fn list_messages(
        &self,
        session_id: Uuid,
        limit: Option<u32>,
        offset: u32,
    ) -> ApiResult<Vec<AgentMessage>> {
        Ok(self.db.list_messages(session_id, limit, offset).await?)
    }

    pub async fn add_tool(&self, agent_id: Uuid, tool_name: &str) -> ApiResult<()> {
        if !self.tool_registry.has(tool_name) {
            return Err(RuntimeError::bad_request(format!("unknown tool: {tool_name}")).into());
        }
        self.db.get_agent(agent_id).await?;
        Ok(self.db.add_tool(agent_id, tool_name).await?)
    }

    pub async fn list_tools(&self, agent_id: Uuid) -> ApiResult<Vec<String>> {
        Ok(self.db.list_tools(agent_id).await?)
    }

    pub async fn add_skill(&self, agent_id: Uuid, skill_id: &str) -> ApiResult<()> {
        if !self.skill_registry.has(skill_id) {
            return Err(RuntimeError::bad_request(format!("unknown skill: {skill_id}")).into());
        }
        self.db.get_agent(agent_id).await?;
        Ok(self.db.add_skill(agent_id, skill_id).await?)
    }

    pub async fn list_skills(&self, agent_id: Uuid) -> ApiResult<Vec<String>> {
        Ok(self.db.list_skills(agent_id).await?)
    }

    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        self.tool_registry.tool_definitions()
    }

    pub fn available_skills(&self) -> Vec<SkillDefinition> {
        self.skill_registry
            .skill_ids()
            .into_iter()
            .filter_map(|id| self.skill_registry.get(id).map(|s| s.to_definition()))
            .collect()
    }

    pub async fn start_agent(&self, agent_id: Uuid) -> ApiResult<Uuid> {
        let agent = self.db.get_agent(agent_id).await?;
        Ok(self.runtimes.ensure_runtime(&agent).await)
    }

    pub async fn stop_agent(&self, agent_id: Uuid) -> ApiResult<()> {
        if let Some(runtime_id) = self.runtimes.runtime_for_agent(agent_id).await {
            self.runtimes.destroy_runtime(runtime_id).await;
        }
        Ok(())
    }

    pub async fn reset_agent(&self, agent_id: Uuid) -> ApiResult<Uuid> {
        self.stop_agent(agent_id).await?;
        self.start_agent(agent_id).await
    }

    /// `sendMessage(sessionId, content, userId)`.
    pub async fn send_message(
        &self,
        session_id: Uuid,
        content: String,
        user_id: Uuid,
    ) -> ApiResult<AgentMessage> {
        if content.trim().is_empty() {
            return Err(RuntimeError::bad_request("message content must not be empty").into());
        }
        let session = self.db.get_session(session_id).await?;
        let agent = self.db.get_agent(session.agent_id).await?;

        self.db
            .create_message(CreateMessageInput {
                session_id,
                role: MessageRole::User,
                content: MessageContent::Text(content.clone()),
                tool_calls: None,
                tool_call_id: None,
            })
            .await?;
        self.memory
            .store_message(agent.id, session_id, "user", &content, Some(user_id))
            .await
            .map_err(RuntimeError::from)?;

        let runtime_id = self.runtimes.ensure_runtime(&agent).await;
        let request = user_turn_request(&agent.config, content);
        let response = self
            .runtimes
            .chat(runtime_id, request, Some(session_id), Some(user_id))
            .await?;

        let assistant_text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let assistant_message = self
            .db
            .create_message(CreateMessageInput {
                session_id,
                role: MessageRole::Assistant,
                content: MessageContent::Text(assistant_text.clone()),
                tool_calls: None,
                tool_call_id: None,
            })
            .await?;
        self.memory
            .store_message(agent.id, session_id, "assistant", &assistant_text, None)
            .await
            .map_err(RuntimeError::from)?;
        self.db.touch_session(session_id).await?;

        Ok(assistant_message)
    }

    /// `streamMessage(sessionId, content, userId)`: same flow as
    /// `sendMessage`, transforming each `ChatStreamChunk` into the
    /// transport-agnostic `{id, content, done}` envelope.
    pub async fn stream_message(
        &self,
        session_id: Uuid,
        content: String,
        user_id: Uuid,
    ) -> ApiResult<impl Stream<Item = StreamEnvelope>> {
        if content.trim().is_empty() {
            return Err(RuntimeError::bad_request("message content must not be empty").into());
        }
        let session = self.db.get_session(session_id).await?;
        let agent = self.db.get_agent(session.agent_id).await?;

        self.db
            .create_message(CreateMessageInput {
                session_id,
                role: MessageRole::User,
                content: MessageContent::Text(content.clone()),
                tool_calls: None,
                tool_call_id: None,
            })
            .await?;
        self.memory
            .store_message(agent.id, session_id, "user", &content, Some(user_id))
            .await
            .map_err(RuntimeError::from)?;

        let runtime_id = self.runtimes.ensure_runtime(&agent).await;
        let request = user_turn_request(&agent.config, content);
        let mut chunks = self
            .runtimes
            .chat_stream(runtime_id, request, Some(session_id), Some(user_id))
            .await?;

        let envelope_id = Uuid::now_v7();
        let db = self.db.clone();
        let memory = self.memory.clone();
        let agent_id = agent.id;

        let stream = async_stream::stream! {
            let mut full_text = String::new();
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(ChatStreamChunk { delta, .. }) => {
                        if let Some(text) = delta.content {
                            full_text.push_str(&text);
                            yield StreamEnvelope { id: envelope_id, content: text, done: false };
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "chat stream failed");
                        break;
                    }
                }
            }

            if let Err(e) = db
                .create_message(CreateMessageInput {
                    session_id,
                    role: MessageRole::Assistant,
                    content: MessageContent::Text(full_text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                })
                .await
            {
                tracing::error!(error = %e, session_id = %session_id, "failed to persist streamed assistant message");
            }
            if let Err(e) = memory
                .store_message(agent_id, session_id, "assistant", &full_text, None)
                .await
            {
                tracing::error!(error = %e, session_id = %session_id, "failed to store streamed assistant message in memory");
            }
            if let Err(e) = db.touch_session(session_id).await {
                tracing::error!(error = %e, session_id = %session_id, "failed to touch session after stream completion");
            }

            yield StreamEnvelope { id: envelope_id, content: String::new(), done: true };
        };

        Ok(stream)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StreamEnvelope {
    pub id: Uuid,
    pub content: String,
    pub done: bool,
}

fn user_turn_request(config: &AgentConfig, content: String) -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage {
            role: ChatRoleOrNone(Some(ChatRole::User)),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }],
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_output_tokens,
        ..Default::default()
    }
}
