// Optional in-memory LRU cache keyed by memory id, with explicit
// invalidation keyed by agent id and session id after writes.

use agentrt_contracts::memory::MemoryEntry;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use uuid::Uuid;

pub struct MemoryCache {
    entries: Mutex<LruCache<Uuid, MemoryEntry>>,
    enabled: bool,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_options(capacity, true)
    }

    /// `enabled` mirrors `MEMORY_ENABLE_CACHE`: when false, `get` always
    /// misses and `put` is a no-op, without the caller needing to branch.
    pub fn with_options(capacity: usize, enabled: bool) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1"),
            )),
            enabled,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<MemoryEntry> {
        if !self.enabled {
            return None;
        }
        self.entries.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, entry: MemoryEntry) {
        if !self.enabled {
            return;
        }
        self.entries.lock().unwrap().put(entry.id, entry);
    }

    pub fn invalidate(&self, id: Uuid) {
        self.entries.lock().unwrap().pop(&id);
    }

    /// Drop every cached entry belonging to this agent (and, if given, this
    /// session) after a write that could make cached answers stale.
    pub fn invalidate_scope(&self, agent_id: Uuid, session_id: Option<Uuid>) {
        let mut guard = self.entries.lock().unwrap();
        let stale: Vec<Uuid> = guard
            .iter()
            .filter(|(_, entry)| {
                entry.agent_id == agent_id && session_id.map(|s| entry.session_id == Some(s)).unwrap_or(true)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            guard.pop(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_contracts::memory::{MemorySource, MemoryType};
    use std::collections::HashMap;

    fn sample_entry(agent_id: Uuid, session_id: Option<Uuid>) -> MemoryEntry {
        MemoryEntry {
            id: Uuid::now_v7(),
            agent_id,
            session_id,
            user_id: None,
            content: "hi".into(),
            memory_type: MemoryType::Episodic,
            source: MemorySource::Conversation,
            embedding: None,
            importance: 0.5,
            decay_factor: 1.0,
            access_count: 0,
            last_accessed_at: None,
            timestamp: chrono::Utc::now(),
            expires_at: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn invalidate_scope_drops_only_matching_session() {
        let cache = MemoryCache::new(8);
        let agent_id = Uuid::now_v7();
        let session_a = Uuid::now_v7();
        let session_b = Uuid::now_v7();
        let entry_a = sample_entry(agent_id, Some(session_a));
        let entry_b = sample_entry(agent_id, Some(session_b));
        cache.put(entry_a.clone());
        cache.put(entry_b.clone());

        cache.invalidate_scope(agent_id, Some(session_a));

        assert!(cache.get(entry_a.id).is_none());
        assert!(cache.get(entry_b.id).is_some());
    }
}
