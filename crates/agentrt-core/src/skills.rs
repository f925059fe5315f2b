// SkillRegistry: id -> skill mapping, richer metadata and lifecycle
// metadata than ToolRegistry.

use agentrt_contracts::skills::{SkillContext, SkillDefinition, SkillExecutionMetadata, SkillOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[async_trait]
pub trait Skill: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn input_schema(&self) -> Value;
    fn output_schema(&self) -> Value;
    async fn execute(&self, input: Value, context: &SkillContext) -> SkillExecutionResult;

    fn to_definition(&self) -> SkillDefinition {
        SkillDefinition {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            version: self.version().to_string(),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
        }
    }
}

pub enum SkillExecutionResult {
    Success(Value),
    Failure(String),
}

impl SkillExecutionResult {
    pub fn success(value: Value) -> Self {
        SkillExecutionResult::Success(value)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        SkillExecutionResult::Failure(message.into())
    }

    pub(crate) fn into_outcome(
        self,
        skill_id: &str,
        skill_name: &str,
        context: &SkillContext,
    ) -> SkillOutcome {
        let metadata = SkillExecutionMetadata {
            execution_id: context.execution_id,
            skill_id: skill_id.to_string(),
            skill_name: skill_name.to_string(),
            start_time: context.started_at,
            end_time: chrono::Utc::now(),
            duration_ms: (chrono::Utc::now() - context.started_at).num_milliseconds(),
        };
        match self {
            SkillExecutionResult::Success(output) => SkillOutcome::Success {
                success: true,
                output,
                metadata,
            },
            SkillExecutionResult::Failure(error) => {
                error!(skill_id, error = %error, "skill execution failed");
                SkillOutcome::Failure {
                    success: false,
                    error,
                    metadata,
                }
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    pub fn register(&mut self, skill: impl Skill + 'static) {
        self.skills.insert(skill.id().to_string(), Arc::new(skill));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn skill_ids(&self) -> Vec<&str> {
        self.skills.keys().map(|s| s.as_str()).collect()
    }

    pub fn resolve(&self, ids: &[String]) -> HashMap<String, Arc<dyn Skill>> {
        ids.iter()
            .filter_map(|id| self.skills.get(id).map(|s| (id.clone(), s.clone())))
            .collect()
    }

    pub async fn execute(
        &self,
        id: &str,
        input: Value,
        agent_id: Uuid,
        session_id: Option<Uuid>,
    ) -> SkillOutcome {
        let context = SkillContext {
            execution_id: Uuid::now_v7(),
            agent_id,
            session_id,
            started_at: chrono::Utc::now(),
        };
        match self.skills.get(id) {
            Some(skill) => skill
                .execute(input, &context)
                .await
                .into_outcome(id, skill.name(), &context),
            None => {
                let metadata = SkillExecutionMetadata {
                    execution_id: context.execution_id,
                    skill_id: id.to_string(),
                    skill_name: id.to_string(),
                    start_time: context.started_at,
                    end_time: chrono::Utc::now(),
                    duration_ms: 0,
                };
                SkillOutcome::Failure {
                    success: false,
                    error: format!("skill not found: {id}"),
                    metadata,
                }
            }
        }
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.skill_ids())
            .finish()
    }
}
