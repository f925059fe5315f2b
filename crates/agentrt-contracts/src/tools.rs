// ToolRegistry contracts: definitions, invocation context, and results.
// Execution logic lives in agentrt-core; this crate only carries the
// wire-level shapes tools are described and invoked with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// JSON-schema description of a tool, as surfaced to an LLM's `tools` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input parameters.
    pub parameters: serde_json::Value,
}

/// Context passed to a tool's `execute`.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub agent_id: Uuid,
    pub session_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Outcome of a tool invocation. Errors never cross the registry boundary
/// as exceptions; they are carried in this shape instead.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ToolOutcome {
    Success { success: bool, output: serde_json::Value },
    Failure { success: bool, error: String },
}

impl ToolOutcome {
    pub fn ok(output: serde_json::Value) -> Self {
        ToolOutcome::Success {
            success: true,
            output,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }
}

/// A tool call as emitted inside an `AgentMessage`, paired with its resolved
/// outcome once the runtime has executed it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}
