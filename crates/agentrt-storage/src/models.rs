// Database row shapes. These intentionally mirror `agentrt-contracts`
// shapes but stay separate so wire DTOs and storage rows can evolve
// independently.

use agentrt_contracts::agent::{Agent, AgentConfig, AgentStatus, AgentType};
use agentrt_contracts::message::{AgentMessage, MessageContent, MessageRole, ToolCallRequest};
use agentrt_contracts::session::AgentSession;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct AgentRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub public: bool,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub agent_type: String,
    pub status: String,
    pub config: Json<AgentConfig>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AgentRow> for Agent {
    fn from(row: AgentRow) -> Self {
        Agent {
            id: row.id,
            owner_id: row.owner_id,
            public: row.public,
            name: row.name,
            description: row.description,
            avatar_url: row.avatar_url,
            agent_type: parse_agent_type(&row.agent_type),
            status: parse_status(&row.status),
            config: row.config.0,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_agent_type(raw: &str) -> AgentType {
    match raw {
        "chat" => AgentType::Chat,
        "task" => AgentType::Task,
        "knowledge" => AgentType::Knowledge,
        "custom" => AgentType::Custom,
        _ => AgentType::Assistant,
    }
}

fn parse_status(raw: &str) -> AgentStatus {
    match raw {
        "initializing" => AgentStatus::Initializing,
        "ready" => AgentStatus::Ready,
        "chatting" => AgentStatus::Chatting,
        "executing" => AgentStatus::Executing,
        "error" => AgentStatus::Error,
        "disabled" => AgentStatus::Disabled,
        "maintenance" => AgentStatus::Maintenance,
        _ => AgentStatus::Idle,
    }
}

pub fn status_to_wire(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Idle => "idle",
        AgentStatus::Initializing => "initializing",
        AgentStatus::Ready => "ready",
        AgentStatus::Chatting => "chatting",
        AgentStatus::Executing => "executing",
        AgentStatus::Error => "error",
        AgentStatus::Disabled => "disabled",
        AgentStatus::Maintenance => "maintenance",
    }
}

pub fn agent_type_to_wire(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Chat => "chat",
        AgentType::Task => "task",
        AgentType::Knowledge => "knowledge",
        AgentType::Assistant => "assistant",
        AgentType::Custom => "custom",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub metadata: Json<serde_json::Map<String, serde_json::Value>>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionRow> for AgentSession {
    fn from(row: SessionRow) -> Self {
        AgentSession {
            id: row.id,
            agent_id: row.agent_id,
            user_id: row.user_id,
            title: row.title,
            metadata: row.metadata.0.into_iter().collect(),
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sequence: i64,
    pub role: String,
    pub content: Json<MessageContent>,
    pub tool_calls: Option<Json<Vec<ToolCallRequest>>>,
    pub tool_call_id: Option<String>,
    pub tokens: i32,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for AgentMessage {
    fn from(row: MessageRow) -> Self {
        AgentMessage {
            id: row.id,
            session_id: row.session_id,
            role: parse_role(&row.role),
            content: row.content.0,
            tool_calls: row.tool_calls.map(|j| j.0),
            tool_call_id: row.tool_call_id,
            tokens: row.tokens.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

fn parse_role(raw: &str) -> MessageRole {
    match raw {
        "assistant" => MessageRole::Assistant,
        "system" => MessageRole::System,
        "tool" => MessageRole::Tool,
        _ => MessageRole::User,
    }
}

pub fn role_to_wire(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
        MessageRole::Tool => "tool",
    }
}
