// ToolRegistry: name -> tool mapping, unique by name.
//
// Errors are distinguished the same way the teacher's executor does:
// tool-level errors are safe to show an LLM, internal errors are logged
// and replaced with a generic message before they reach the loop.

use agentrt_contracts::tools::{ToolContext, ToolDefinition, ToolOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// A single tool: name, description, JSON-schema parameters, and execution.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, input: Value, context: &ToolContext) -> ToolExecutionResult;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Outcome of a tool's own logic, before it is folded into the
/// registry-boundary `ToolOutcome` shape.
#[derive(Debug)]
pub enum ToolExecutionResult {
    Success(Value),
    ToolError(String),
    InternalError(String),
}

impl ToolExecutionResult {
    pub fn success(value: Value) -> Self {
        ToolExecutionResult::Success(value)
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(message.into())
    }

    /// Fold into the wire-level `ToolOutcome`. Internal errors are logged
    /// here and never leave with their original detail.
    pub fn into_outcome(self, tool_name: &str) -> ToolOutcome {
        match self {
            ToolExecutionResult::Success(v) => ToolOutcome::ok(v),
            ToolExecutionResult::ToolError(msg) => ToolOutcome::err(msg),
            ToolExecutionResult::InternalError(msg) => {
                error!(tool_name, error = %msg, "tool internal error (hidden from caller)");
                ToolOutcome::err("an internal error occurred while executing the tool")
            }
        }
    }
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Resolve a subset of tools by name, for an agent's `enabled_tools` list.
    pub fn resolve(&self, names: &[String]) -> HashMap<String, Arc<dyn Tool>> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| (name.clone(), t.clone())))
            .collect()
    }

    /// Execute a tool by name; errors never cross this boundary as
    /// exceptions, only as `ToolOutcome::Failure`.
    pub async fn execute(&self, name: &str, input: Value, context: &ToolContext) -> ToolOutcome {
        match self.tools.get(name) {
            Some(tool) => tool.execute(input, context).await.into_outcome(name),
            None => ToolOutcome::err(format!("tool not found: {name}")),
        }
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.registry.register(tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, input: Value, _context: &ToolContext) -> ToolExecutionResult {
            ToolExecutionResult::success(input)
        }
    }

    #[tokio::test]
    async fn internal_error_is_hidden_from_outcome() {
        let outcome =
            ToolExecutionResult::internal_error("db connection refused").into_outcome("echo");
        match outcome {
            ToolOutcome::Failure { error, .. } => {
                assert!(!error.contains("db connection"));
            }
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn registry_executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let context = ToolContext {
            agent_id: Uuid::now_v7(),
            session_id: None,
            user_id: None,
        };
        let outcome = registry.execute("echo", json!({"x": 1}), &context).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn unknown_tool_returns_failure_not_panic() {
        let registry = ToolRegistry::new();
        let context = ToolContext {
            agent_id: Uuid::now_v7(),
            session_id: None,
            user_id: None,
        };
        let outcome = registry.execute("missing", json!({}), &context).await;
        assert!(!outcome.is_success());
    }
}
