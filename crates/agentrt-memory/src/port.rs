// Bridges the full `MemoryStore` contract to the narrow `MemoryPort` trait
// the runtime depends on, so `RuntimeManager` can run against a real memory
// backend instead of only `NullMemoryPort`.

use crate::store::{MemoryStore, RecentMemoriesOptions};
use agentrt_core::error::Result as RuntimeResult;
use agentrt_core::memory_port::{MemoryPort, RecentMemory};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub struct MemoryPortAdapter<S: MemoryStore> {
    store: Arc<S>,
}

impl<S: MemoryStore> MemoryPortAdapter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: MemoryStore + 'static> MemoryPort for MemoryPortAdapter<S> {
    async fn get_recent_memories(&self, agent_id: Uuid, limit: usize) -> RuntimeResult<Vec<RecentMemory>> {
        let entries = self
            .store
            .get_recent_memories(agent_id, limit, RecentMemoriesOptions::default())
            .await
            .map_err(agentrt_core::error::RuntimeError::from)?;

        // get_recent_memories returns newest-first; chat history wants
        // chronological order for prompt assembly.
        let mut recent: Vec<RecentMemory> = entries
            .into_iter()
            .rev()
            .map(|entry| RecentMemory {
                role: entry
                    .metadata
                    .get("role")
                    .and_then(|v| v.as_str())
                    .unwrap_or("user")
                    .to_string(),
                content: entry.content,
            })
            .collect();
        recent.truncate(limit);
        Ok(recent)
    }

    async fn store_message(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        role: &str,
        content: &str,
        user_id: Option<Uuid>,
    ) -> RuntimeResult<()> {
        self.store
            .store_message(agent_id, session_id, role, content, user_id)
            .await
            .map_err(agentrt_core::error::RuntimeError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use crate::store::InProcessMemoryStore;
    use agentrt_core::events::EventBus;

    #[tokio::test]
    async fn adapter_round_trips_messages_in_chronological_order() {
        let inner = Arc::new(InProcessMemoryStore::new(
            Arc::new(HashEmbeddingProvider::default()),
            Arc::new(EventBus::new()),
        ));
        let adapter = MemoryPortAdapter::new(inner);
        let agent_id = Uuid::now_v7();
        let session_id = Uuid::now_v7();

        adapter.store_message(agent_id, session_id, "user", "hi", None).await.unwrap();
        adapter.store_message(agent_id, session_id, "assistant", "hello", None).await.unwrap();

        let recent = adapter.get_recent_memories(agent_id, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "hi");
        assert_eq!(recent[1].content, "hello");
    }
}
