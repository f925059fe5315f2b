// Tunables for `InProcessMemoryStore`, matching the `MEMORY_*` environment
// variables documented in spec.md §6. This struct only carries values and
// defaults; parsing them out of the environment is `agentrt-api::config`'s
// job, the same split the teacher draws between a typed config struct and
// its `from_env` loader.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// `MEMORY_MAX_TOKENS`: token budget for `get_conversation_history`.
    pub max_tokens: u32,
    /// `MEMORY_LIMIT`: default result cap used where a caller passes `0`.
    pub limit: usize,
    /// `MEMORY_SEARCH_THRESHOLD`: minimum relevance score kept by `search`.
    pub search_threshold: f32,
    /// `MEMORY_SEARCH_LIMIT`: default result cap for `search` when
    /// `MemorySearchQuery::limit` is `0`.
    pub search_limit: usize,
    /// `MEMORY_ENABLE_CACHE`: whether the LRU read cache is active.
    pub enable_cache: bool,
    /// `MEMORY_CACHE_SIZE`: LRU cache capacity.
    pub cache_size: usize,
    /// `MEMORY_DECAY_RATE`: `decay_factor` reduction applied to entries
    /// older than the consolidation age each time `consolidate` runs.
    pub decay_rate: f32,
    /// `MEMORY_IMPORTANCE_THRESHOLD`: episodic entries below this
    /// importance are eligible for promotion to semantic during
    /// consolidation.
    pub importance_threshold: f32,
    /// `MEMORY_AUTO_CONSOLIDATION`: whether the scheduled consolidation task
    /// runs at all.
    pub auto_consolidation: bool,
    /// `MEMORY_CONSOLIDATION_INTERVAL`: period of the scheduled
    /// consolidation sweep.
    pub consolidation_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8_000,
            limit: 1_000,
            search_threshold: 0.7,
            search_limit: 10,
            enable_cache: true,
            cache_size: 1_024,
            decay_rate: 0.05,
            importance_threshold: 0.3,
            auto_consolidation: true,
            consolidation_interval: Duration::from_secs(3_600),
        }
    }
}
