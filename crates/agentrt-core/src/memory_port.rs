// Narrow seam the runtime needs from the memory subsystem. The full
// MemoryStore contract (search, consolidation, stats, ...) lives in
// agentrt-memory; this trait is what AgentRuntime actually calls.

use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RecentMemory {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait MemoryPort: Send + Sync {
    async fn get_recent_memories(&self, agent_id: Uuid, limit: usize) -> Result<Vec<RecentMemory>>;

    async fn store_message(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        role: &str,
        content: &str,
        user_id: Option<Uuid>,
    ) -> Result<()>;
}

/// No-op memory port for standalone use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemoryPort;

#[async_trait]
impl MemoryPort for NullMemoryPort {
    async fn get_recent_memories(&self, _agent_id: Uuid, _limit: usize) -> Result<Vec<RecentMemory>> {
        Ok(Vec::new())
    }

    async fn store_message(
        &self,
        _agent_id: Uuid,
        _session_id: Uuid,
        _role: &str,
        _content: &str,
        _user_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }
}
