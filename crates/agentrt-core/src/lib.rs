//! Event bus, tool/skill registries, LLM provider contracts, provider
//! factory, and the per-agent runtime loop.

pub mod builtin_skills;
pub mod builtin_tools;
pub mod error;
pub mod events;
pub mod llm;
pub mod memory_port;
pub mod provider_factory;
pub mod runtime;
pub mod skills;
pub mod test_support;
pub mod tools;

pub use error::{Result, RuntimeError};
pub use events::{EventBus, SubscriptionHandle};
pub use llm::{ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmProvider, ToolCallAccumulator};
pub use memory_port::{MemoryPort, NullMemoryPort, RecentMemory};
pub use provider_factory::ProviderFactory;
pub use runtime::{AgentRuntime, RuntimeManager, RuntimeState};
pub use skills::{Skill, SkillExecutionResult, SkillRegistry};
pub use tools::{Tool, ToolExecutionResult, ToolRegistry, ToolRegistryBuilder};
