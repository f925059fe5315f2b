// Agent entity and configuration.
//
// Agent is the persisted configuration for an addressable conversational
// unit: identity, presentation, classification, lifecycle status, and a
// nested AgentConfig describing model, memory policy, and LLM binding.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Classification of an agent's primary purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Chat,
    Task,
    Knowledge,
    Assistant,
    Custom,
}

/// Lifecycle status of an agent, mirrored by its Runtime's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Initializing,
    Ready,
    Chatting,
    Executing,
    Error,
    Disabled,
    Maintenance,
}

/// Memory retrieval/window policy for an agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryPolicy {
    /// Max tokens to include when assembling the conversation window.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// How many recent memories to inject as context messages.
    #[serde(default = "default_recent_limit")]
    pub recent_memory_limit: usize,
    /// Preferred memory type for recent-memory injection.
    #[serde(default)]
    pub memory_type: Option<crate::memory::MemoryType>,
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_recent_limit() -> usize {
    10
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            recent_memory_limit: default_recent_limit(),
            memory_type: None,
        }
    }
}

/// Binding to a named LLM provider plus per-call defaults.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LlmBinding {
    /// Provider name as registered in the provider factory ("openai", "anthropic", ...).
    pub provider: String,
    /// API key for the provider. Never serialized back out to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Agent-level configuration: model, sampling defaults, tools/skills, memory policy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentConfig {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    #[serde(default)]
    pub enabled_skills: Vec<String>,
    #[serde(default)]
    pub memory_policy: MemoryPolicy,
    pub llm: LlmBinding,
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

/// A persisted agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Agent {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub public: bool,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub config: AgentConfig,
    pub deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Agent {
    pub fn is_visible(&self) -> bool {
        !self.deleted
    }
}

/// Request body to create an agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_agent_type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub public: bool,
    pub config: AgentConfig,
}

fn default_agent_type() -> AgentType {
    AgentType::Assistant
}

/// Request body to update an agent. All fields optional; only provided
/// fields are applied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub config: Option<AgentConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_policy_defaults() {
        let policy = MemoryPolicy::default();
        assert_eq!(policy.max_tokens, 8000);
        assert_eq!(policy.recent_memory_limit, 10);
    }

    #[test]
    fn agent_visibility_respects_soft_delete() {
        let mut agent = sample_agent();
        assert!(agent.is_visible());
        agent.deleted = true;
        assert!(!agent.is_visible());
    }

    fn sample_agent() -> Agent {
        Agent {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            public: false,
            name: "Test".into(),
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
                    provider: "openai".into(),
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
}
