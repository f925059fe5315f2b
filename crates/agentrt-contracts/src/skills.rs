// SkillRegistry contracts: richer metadata than tools, plus execution metadata.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

/// Context passed to a skill's `execute`. Skills get an executionId and a
/// cancellation signal that tools do not, since skills are longer-running.
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub execution_id: Uuid,
    pub agent_id: Uuid,
    pub session_id: Option<Uuid>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkillExecutionMetadata {
    pub execution_id: Uuid,
    pub skill_id: String,
    pub skill_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SkillOutcome {
    Success {
        success: bool,
        output: serde_json::Value,
        metadata: SkillExecutionMetadata,
    },
    Failure {
        success: bool,
        error: String,
        metadata: SkillExecutionMetadata,
    },
}

impl SkillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SkillOutcome::Success { .. })
    }
}
