// MemoryStore trait and its in-process implementation: storage, lexical and
// semantic search, decay-aware ranking, consolidation, and a cache layer.

use crate::cache::MemoryCache;
use crate::config::MemoryConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{MemoryError, Result};
use agentrt_contracts::events::{Event, EventMetadata};
use agentrt_contracts::memory::{
    ConsolidationReport, MemoryEntry, MemoryEntryDraft, MemorySource, MemoryStats, MemorySummary,
    MemoryType,
};
use agentrt_core::builtin_skills::{extract_entities, top_topics};
use agentrt_core::events::EventBus;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

const VECTOR_SCAN_CAP: usize = 10_000;
const CONSOLIDATION_AGE: ChronoDuration = ChronoDuration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Timestamp,
    Importance,
    AccessCount,
}

#[derive(Debug, Clone)]
pub struct RecentMemoriesOptions {
    pub sort_by: SortBy,
    pub include_expired: bool,
}

impl Default for RecentMemoriesOptions {
    fn default() -> Self {
        Self {
            sort_by: SortBy::Timestamp,
            include_expired: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySearchQuery {
    pub agent_id: Uuid,
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub source: Option<MemorySource>,
    pub session_id: Option<Uuid>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_importance: Option<f32>,
    pub category: Option<String>,
    pub threshold: Option<f32>,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub messages: Vec<MemoryEntry>,
    pub total_tokens: u32,
    pub truncated: bool,
    pub summary: Option<String>,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, draft: MemoryEntryDraft) -> Result<MemoryEntry>;
    async fn store_batch(&self, drafts: Vec<MemoryEntryDraft>) -> Result<Vec<MemoryEntry>>;
    async fn retrieve(&self, id: Uuid) -> Result<Option<MemoryEntry>>;
    async fn search(&self, query: MemorySearchQuery) -> Result<Vec<MemoryEntry>>;
    async fn semantic_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>>;
    async fn full_text_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>>;
    async fn hybrid_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn delete_by_session(&self, session_id: Uuid) -> Result<u64>;
    async fn clear(&self, agent_id: Uuid, session_id: Option<Uuid>) -> Result<u64>;
    async fn count(&self, agent_id: Uuid) -> Result<u64>;
    async fn get_stats(&self, agent_id: Uuid) -> Result<MemoryStats>;
    async fn get_conversation_history(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        max_tokens: u32,
    ) -> Result<ConversationHistory>;
    async fn summarize_session(&self, agent_id: Uuid, session_id: Uuid) -> Result<MemorySummary>;
    async fn store_message(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        role: &str,
        content: &str,
        user_id: Option<Uuid>,
    ) -> Result<MemoryEntry>;
    async fn get_recent_memories(
        &self,
        agent_id: Uuid,
        limit: usize,
        options: RecentMemoriesOptions,
    ) -> Result<Vec<MemoryEntry>>;
    async fn update_importance(&self, id: Uuid, value: f32) -> Result<()>;
    async fn consolidate(&self, agent_id: Uuid) -> Result<ConsolidationReport>;
}

/// Computes the default importance heuristic for a draft missing an
/// explicit value: 0.5 base, +0.2 semantic, +0.1 user-sourced, +0.1
/// non-empty tags, +0.1 content over 500 chars, clamped to [0, 1].
fn default_importance(draft: &MemoryEntryDraft, memory_type: MemoryType, source: MemorySource) -> f32 {
    let mut score = 0.5;
    if memory_type == MemoryType::Semantic {
        score += 0.2;
    }
    if source == MemorySource::User {
        score += 0.1;
    }
    let has_tags = draft
        .metadata
        .get("tags")
        .map(|v| match v {
            Value::Array(a) => !a.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => false,
        })
        .unwrap_or(false);
    if has_tags {
        score += 0.1;
    }
    if draft.content.chars().count() > 500 {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

pub struct InProcessMemoryStore {
    entries: RwLock<HashMap<Uuid, MemoryEntry>>,
    summaries: RwLock<HashMap<(Uuid, Uuid), MemorySummary>>,
    embeddings: Arc<dyn EmbeddingProvider>,
    events: Arc<EventBus>,
    cache: MemoryCache,
    config: MemoryConfig,
}

impl InProcessMemoryStore {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, events: Arc<EventBus>) -> Self {
        Self::with_config(embeddings, events, MemoryConfig::default())
    }

    pub fn with_config(embeddings: Arc<dyn EmbeddingProvider>, events: Arc<EventBus>, config: MemoryConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            summaries: RwLock::new(HashMap::new()),
            embeddings,
            events,
            cache: MemoryCache::with_options(config.cache_size, config.enable_cache),
            config,
        }
    }

    /// Distinct agent ids currently holding at least one memory entry, used
    /// to drive the scheduled consolidation sweep.
    async fn known_agent_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .entries
            .read()
            .await
            .values()
            .map(|e| e.agent_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Spawn the scheduled consolidation task, gated by
    /// `MEMORY_AUTO_CONSOLIDATION`. Keep the returned handle alive for the
    /// process lifetime; dropping it aborts the task. Mirrors
    /// `RuntimeManager::spawn_sweeper`'s tick-and-sweep shape.
    pub fn spawn_consolidation_task(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.auto_consolidation {
            info!("MEMORY_AUTO_CONSOLIDATION disabled, scheduled consolidation will not run");
            return None;
        }
        let store = self.clone();
        let interval = self.config.consolidation_interval;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.consolidate_all().await;
            }
        }))
    }

    async fn consolidate_all(&self) {
        for agent_id in self.known_agent_ids().await {
            match self.consolidate(agent_id).await {
                Ok(report) if report.consolidated > 0 || report.deleted > 0 => {
                    info!(
                        agent_id = %agent_id,
                        consolidated = report.consolidated,
                        deleted = report.deleted,
                        "scheduled consolidation updated memory entries"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(agent_id = %agent_id, error = %e, "scheduled consolidation failed"),
            }
        }
    }

    async fn emit(&self, event_type: &str, agent_id: Uuid, session_id: Option<Uuid>, payload: Value) {
        self.events
            .emit(Event::new(
                event_type,
                payload,
                EventMetadata {
                    agent_id,
                    session_id,
                    execution_id: None,
                    user_id: None,
                },
            ))
            .await;
    }

    async fn agent_entries(&self, agent_id: Uuid) -> Vec<MemoryEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MemoryStore for InProcessMemoryStore {
    async fn store(&self, draft: MemoryEntryDraft) -> Result<MemoryEntry> {
        let memory_type = draft.memory_type.unwrap_or_default();
        let source = draft.source.unwrap_or_default();
        let importance = draft
            .importance
            .unwrap_or_else(|| default_importance(&draft, memory_type, source));
        let embedding = match &draft.embedding {
            Some(v) => Some(v.clone()),
            None => match self.embeddings.embed(&draft.content).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "embedding provider failed, storing memory without a vector");
                    None
                }
            },
        };

        let entry = MemoryEntry {
            id: Uuid::now_v7(),
            agent_id: draft.agent_id,
            session_id: draft.session_id,
            user_id: draft.user_id,
            content: draft.content,
            memory_type,
            source,
            embedding,
            importance,
            decay_factor: 1.0,
            access_count: 0,
            last_accessed_at: None,
            timestamp: Utc::now(),
            expires_at: draft.expires_at,
            metadata: draft.metadata,
        };

        self.entries.write().await.insert(entry.id, entry.clone());
        self.cache.invalidate_scope(entry.agent_id, entry.session_id);
        self.emit(
            "memory.stored",
            entry.agent_id,
            entry.session_id,
            serde_json::json!({ "id": entry.id }),
        )
        .await;
        Ok(entry)
    }

    async fn store_batch(&self, drafts: Vec<MemoryEntryDraft>) -> Result<Vec<MemoryEntry>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            stored.push(self.store(draft).await?);
        }
        Ok(stored)
    }

    async fn retrieve(&self, id: Uuid) -> Result<Option<MemoryEntry>> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(Some(cached));
        }
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        entry.access_count += 1;
        entry.last_accessed_at = Some(Utc::now());
        let snapshot = entry.clone();
        drop(entries);
        self.cache.put(snapshot.clone());
        self.emit("memory.retrieved", snapshot.agent_id, snapshot.session_id, serde_json::json!({ "id": id }))
            .await;
        Ok(Some(snapshot))
    }

    async fn search(&self, query: MemorySearchQuery) -> Result<Vec<MemoryEntry>> {
        let threshold = query.threshold.unwrap_or(self.config.search_threshold);
        let query_embedding = match &query.content {
            Some(text) if !text.is_empty() => self.embeddings.embed(text).await.ok(),
            _ => None,
        };

        let now = Utc::now();
        let mut scored: Vec<(f32, MemoryEntry)> = self
            .agent_entries(query.agent_id)
            .await
            .into_iter()
            .filter(|e| !e.is_expired(now))
            .filter(|e| query.memory_type.map(|t| t == e.memory_type).unwrap_or(true))
            .filter(|e| query.source.map(|s| s == e.source).unwrap_or(true))
            .filter(|e| query.session_id.map(|s| e.session_id == Some(s)).unwrap_or(true))
            .filter(|e| query.min_importance.map(|m| e.importance >= m).unwrap_or(true))
            .filter(|e| {
                query
                    .category
                    .as_ref()
                    .map(|c| e.metadata.get("category").and_then(|v| v.as_str()) == Some(c.as_str()))
                    .unwrap_or(true)
            })
            .filter(|e| {
                query
                    .time_range
                    .map(|(start, end)| e.timestamp >= start && e.timestamp <= end)
                    .unwrap_or(true)
            })
            .map(|entry| {
                let semantic = match (&query_embedding, &entry.embedding) {
                    (Some(q), Some(v)) => cosine_similarity(q, v),
                    _ => 0.0,
                };
                let importance_term = 0.5 + 0.5 * entry.importance;
                let decay_term = 0.7 + 0.3 * entry.importance * entry.decay_factor;
                let relevance = semantic * importance_term * decay_term;
                (relevance, entry)
            })
            .filter(|(relevance, _)| *relevance >= threshold || query_embedding.is_none())
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let limit = if query.limit == 0 { self.config.search_limit } else { query.limit };
        Ok(scored.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn semantic_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>> {
        let query_embedding = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let mut candidates = self.agent_entries(agent_id).await;
        if candidates.len() > VECTOR_SCAN_CAP {
            warn!(
                agent_id = %agent_id,
                count = candidates.len(),
                cap = VECTOR_SCAN_CAP,
                "semantic search exceeded the brute-force scan cap, truncating"
            );
            candidates.truncate(VECTOR_SCAN_CAP);
        }

        let mut scored: Vec<(f32, MemoryEntry)> = candidates
            .into_iter()
            .filter_map(|e| {
                let score = e.embedding.as_ref().map(|v| cosine_similarity(&query_embedding, v))?;
                Some((score, e))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn full_text_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>> {
        let needle = query.to_lowercase();
        let mut matches: Vec<MemoryEntry> = self
            .agent_entries(agent_id)
            .await
            .into_iter()
            .filter(|e| e.content.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn hybrid_search(&self, query: &str, agent_id: Uuid, limit: usize) -> Result<Vec<MemoryEntry>> {
        let semantic = self.semantic_search(query, agent_id, limit * 2).await?;
        let lexical = self.full_text_search(query, agent_id, limit * 2).await?;

        let needle = query.to_lowercase();
        let mut combined: HashMap<Uuid, (f32, MemoryEntry)> = HashMap::new();
        for entry in semantic {
            let score = entry
                .embedding
                .as_ref()
                .map(|_| 1.0)
                .unwrap_or(0.0);
            combined.insert(entry.id, (score * 0.7, entry));
        }
        for entry in lexical {
            let lexical_score = if entry.content.to_lowercase().contains(&needle) { 1.0 } else { 0.0 };
            combined
                .entry(entry.id)
                .and_modify(|(score, _)| *score += lexical_score * 0.3)
                .or_insert((lexical_score * 0.3, entry));
        }

        let mut ranked: Vec<(f32, MemoryEntry)> = combined.into_values().collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let removed = self.entries.write().await.remove(&id);
        if let Some(entry) = removed {
            self.cache.invalidate(id);
            self.emit("memory.deleted", entry.agent_id, entry.session_id, serde_json::json!({ "id": id }))
                .await;
        }
        Ok(())
    }

    async fn delete_by_session(&self, session_id: Uuid) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let to_remove: Vec<Uuid> = entries
            .values()
            .filter(|e| e.session_id == Some(session_id))
            .map(|e| e.id)
            .collect();
        let mut agent_id = None;
        for id in &to_remove {
            if let Some(entry) = entries.remove(id) {
                agent_id = Some(entry.agent_id);
                self.cache.invalidate(*id);
            }
        }
        drop(entries);
        if let Some(agent_id) = agent_id {
            self.emit(
                "memory.deleted",
                agent_id,
                Some(session_id),
                serde_json::json!({ "session_id": session_id, "count": to_remove.len() }),
            )
            .await;
        }
        Ok(to_remove.len() as u64)
    }

    async fn clear(&self, agent_id: Uuid, session_id: Option<Uuid>) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let to_remove: Vec<Uuid> = entries
            .values()
            .filter(|e| e.agent_id == agent_id && session_id.map(|s| e.session_id == Some(s)).unwrap_or(true))
            .map(|e| e.id)
            .collect();
        for id in &to_remove {
            entries.remove(id);
            self.cache.invalidate(*id);
        }
        drop(entries);
        self.cache.invalidate_scope(agent_id, session_id);
        self.emit(
            "memory.deleted",
            agent_id,
            session_id,
            serde_json::json!({ "count": to_remove.len() }),
        )
        .await;
        Ok(to_remove.len() as u64)
    }

    async fn count(&self, agent_id: Uuid) -> Result<u64> {
        Ok(self.agent_entries(agent_id).await.len() as u64)
    }

    async fn get_stats(&self, agent_id: Uuid) -> Result<MemoryStats> {
        let entries = self.agent_entries(agent_id).await;
        let total = entries.len() as u64;
        if total == 0 {
            return Ok(MemoryStats {
                total: 0,
                by_type: HashMap::new(),
                by_source: HashMap::new(),
                avg_importance: 0.0,
                avg_access_count: 0.0,
                earliest: None,
                latest: None,
            });
        }

        let mut by_type: HashMap<String, u64> = HashMap::new();
        let mut by_source: HashMap<String, u64> = HashMap::new();
        let mut importance_sum = 0.0f32;
        let mut access_sum = 0u64;
        let mut earliest = entries[0].timestamp;
        let mut latest = entries[0].timestamp;

        for entry in &entries {
            *by_type.entry(format!("{:?}", entry.memory_type).to_lowercase()).or_insert(0) += 1;
            *by_source.entry(format!("{:?}", entry.source).to_lowercase()).or_insert(0) += 1;
            importance_sum += entry.importance;
            access_sum += entry.access_count;
            earliest = earliest.min(entry.timestamp);
            latest = latest.max(entry.timestamp);
        }

        Ok(MemoryStats {
            total,
            by_type,
            by_source,
            avg_importance: importance_sum / total as f32,
            avg_access_count: access_sum as f32 / total as f32,
            earliest: Some(earliest),
            latest: Some(latest),
        })
    }

    async fn get_conversation_history(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        max_tokens: u32,
    ) -> Result<ConversationHistory> {
        let mut episodic: Vec<MemoryEntry> = self
            .agent_entries(agent_id)
            .await
            .into_iter()
            .filter(|e| e.session_id == Some(session_id) && e.memory_type == MemoryType::Episodic)
            .collect();
        episodic.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let mut total_tokens = 0u32;
        let mut truncated = false;
        let mut kept_reversed = Vec::new();
        for entry in episodic.iter().rev() {
            let tokens = agentrt_contracts::message::estimate_tokens(&entry.content);
            if total_tokens + tokens > max_tokens && !kept_reversed.is_empty() {
                truncated = true;
                break;
            }
            total_tokens += tokens;
            kept_reversed.push(entry.clone());
        }
        kept_reversed.reverse();

        let summary = if truncated {
            self.summaries
                .read()
                .await
                .get(&(agent_id, session_id))
                .map(|s| s.summary.clone())
        } else {
            None
        };

        Ok(ConversationHistory {
            messages: kept_reversed,
            total_tokens,
            truncated,
            summary,
        })
    }

    async fn summarize_session(&self, agent_id: Uuid, session_id: Uuid) -> Result<MemorySummary> {
        let mut episodic: Vec<MemoryEntry> = self
            .agent_entries(agent_id)
            .await
            .into_iter()
            .filter(|e| e.session_id == Some(session_id) && e.memory_type == MemoryType::Episodic)
            .collect();
        episodic.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let full_text = episodic.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join("\n");
        let key_points: Vec<String> = episodic
            .iter()
            .rev()
            .take(5)
            .map(|e| e.content.clone())
            .collect();
        let entities = extract_entities(&full_text);
        let topics = top_topics(&full_text, 5);
        let summary_text = if full_text.chars().count() > 280 {
            format!("{}...", full_text.chars().take(280).collect::<String>())
        } else {
            full_text.clone()
        };

        let summary = MemorySummary {
            id: Uuid::now_v7(),
            agent_id,
            session_id,
            summary: summary_text,
            message_count: episodic.len() as u64,
            key_points,
            entities,
            topics,
            created_at: Utc::now(),
        };

        self.summaries.write().await.insert((agent_id, session_id), summary.clone());
        self.emit(
            "memory.summarized",
            agent_id,
            Some(session_id),
            serde_json::json!({ "summary_id": summary.id }),
        )
        .await;
        Ok(summary)
    }

    async fn store_message(
        &self,
        agent_id: Uuid,
        session_id: Uuid,
        role: &str,
        content: &str,
        user_id: Option<Uuid>,
    ) -> Result<MemoryEntry> {
        let mut metadata = HashMap::new();
        metadata.insert("role".to_string(), Value::String(role.to_string()));
        self.store(MemoryEntryDraft {
            agent_id,
            session_id: Some(session_id),
            user_id,
            content: content.to_string(),
            memory_type: Some(MemoryType::Episodic),
            source: Some(if role == "user" { MemorySource::User } else { MemorySource::Conversation }),
            embedding: None,
            importance: None,
            expires_at: None,
            metadata,
        })
        .await
    }

    async fn get_recent_memories(
        &self,
        agent_id: Uuid,
        limit: usize,
        options: RecentMemoriesOptions,
    ) -> Result<Vec<MemoryEntry>> {
        let now = Utc::now();
        let mut entries: Vec<MemoryEntry> = self
            .agent_entries(agent_id)
            .await
            .into_iter()
            .filter(|e| options.include_expired || !e.is_expired(now))
            .collect();

        match options.sort_by {
            SortBy::Timestamp => entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            SortBy::Importance => entries.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal)),
            SortBy::AccessCount => entries.sort_by(|a, b| b.access_count.cmp(&a.access_count)),
        }
        entries.truncate(limit);
        Ok(entries)
    }

    async fn update_importance(&self, id: Uuid, value: f32) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id).ok_or(MemoryError::NotFound(id))?;
        entry.importance = value.clamp(0.0, 1.0);
        self.cache.invalidate(id);
        Ok(())
    }

    async fn consolidate(&self, agent_id: Uuid) -> Result<ConsolidationReport> {
        let now = Utc::now();
        let mut report = ConsolidationReport::default();
        let mut entries = self.entries.write().await;

        let ids: Vec<Uuid> = entries
            .values()
            .filter(|e| e.agent_id == agent_id)
            .map(|e| e.id)
            .collect();

        for id in ids {
            let should_delete = entries.get(&id).map(|e| e.is_expired(now)).unwrap_or(false);
            if should_delete {
                entries.remove(&id);
                report.deleted += 1;
                continue;
            }

            let Some(entry) = entries.get_mut(&id) else { continue };
            let is_old = now - entry.timestamp > CONSOLIDATION_AGE;
            if is_old {
                entry.decay_factor = (entry.decay_factor - self.config.decay_rate).max(0.0);
            }
            if is_old && entry.importance < self.config.importance_threshold && entry.memory_type == MemoryType::Episodic {
                entry.memory_type = MemoryType::Semantic;
                entry.importance = (entry.importance * 1.2).min(1.0);
                report.consolidated += 1;
            }
        }
        drop(entries);
        self.cache.invalidate_scope(agent_id, None);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;

    fn store() -> InProcessMemoryStore {
        InProcessMemoryStore::new(Arc::new(HashEmbeddingProvider::default()), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn store_computes_importance_and_embedding_when_absent() {
        let store = store();
        let entry = store
            .store(MemoryEntryDraft {
                agent_id: Uuid::now_v7(),
                content: "x".repeat(600),
                memory_type: Some(MemoryType::Semantic),
                source: Some(MemorySource::User),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(entry.embedding.is_some());
        // base 0.5 + semantic 0.2 + user 0.1 + long content 0.1 = 0.9
        assert!((entry.importance - 0.9).abs() < 1e-5);
    }

    #[tokio::test]
    async fn retrieve_increments_access_count_and_populates_cache() {
        let store = store();
        let entry = store
            .store(MemoryEntryDraft {
                agent_id: Uuid::now_v7(),
                content: "hello".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let first = store.retrieve(entry.id).await.unwrap().unwrap();
        assert_eq!(first.access_count, 1);
        assert!(store.cache.get(entry.id).is_some());
    }

    #[tokio::test]
    async fn consolidate_promotes_old_low_importance_episodic_entries() {
        let store = store();
        let agent_id = Uuid::now_v7();
        let entry = store
            .store(MemoryEntryDraft {
                agent_id,
                content: "old note".into(),
                memory_type: Some(MemoryType::Episodic),
                importance: Some(0.2),
                ..Default::default()
            })
            .await
            .unwrap();
        {
            let mut entries = store.entries.write().await;
            entries.get_mut(&entry.id).unwrap().timestamp = Utc::now() - ChronoDuration::days(10);
        }

        let report = store.consolidate(agent_id).await.unwrap();
        assert_eq!(report.consolidated, 1);

        let updated = store.retrieve(entry.id).await.unwrap().unwrap();
        assert_eq!(updated.memory_type, MemoryType::Semantic);
        // 0.2 * 1.2 promotion boost
        assert!((updated.importance - 0.24).abs() < 1e-5);
        // decay_factor reduced by MEMORY_DECAY_RATE's default for entries past the consolidation age
        assert!((updated.decay_factor - (1.0 - MemoryConfig::default().decay_rate)).abs() < 1e-5);
    }

    #[tokio::test]
    async fn consolidate_leaves_importance_at_or_above_threshold_untouched() {
        let store = store();
        let agent_id = Uuid::now_v7();
        let entry = store
            .store(MemoryEntryDraft {
                agent_id,
                content: "old but noteworthy".into(),
                memory_type: Some(MemoryType::Episodic),
                importance: Some(0.3),
                ..Default::default()
            })
            .await
            .unwrap();
        {
            let mut entries = store.entries.write().await;
            entries.get_mut(&entry.id).unwrap().timestamp = Utc::now() - ChronoDuration::days(10);
        }

        let report = store.consolidate(agent_id).await.unwrap();
        assert_eq!(report.consolidated, 0);

        let updated = store.retrieve(entry.id).await.unwrap().unwrap();
        assert_eq!(updated.memory_type, MemoryType::Episodic);
        assert!((updated.importance - 0.3).abs() < 1e-5);
    }

    #[tokio::test]
    async fn consolidate_deletes_expired_entries() {
        let store = store();
        let agent_id = Uuid::now_v7();
        let entry = store
            .store(MemoryEntryDraft {
                agent_id,
                content: "expiring".into(),
                expires_at: Some(Utc::now() - ChronoDuration::seconds(1)),
                ..Default::default()
            })
            .await
            .unwrap();

        let report = store.consolidate(agent_id).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.retrieve(entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_conversation_history_truncates_by_token_budget() {
        let store = store();
        let agent_id = Uuid::now_v7();
        let session_id = Uuid::now_v7();
        for i in 0..20 {
            store
                .store_message(agent_id, session_id, "user", &format!("message number {i} with some padding text"), None)
                .await
                .unwrap();
        }

        let history = store.get_conversation_history(agent_id, session_id, 50).await.unwrap();
        assert!(history.truncated);
        assert!(history.total_tokens <= 50);
        // Original order preserved (ascending timestamp).
        for pair in history.messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn full_text_search_is_case_insensitive_and_newest_first() {
        let store = store();
        let agent_id = Uuid::now_v7();
        store
            .store(MemoryEntryDraft { agent_id, content: "The Quick Fox".into(), ..Default::default() })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store
            .store(MemoryEntryDraft { agent_id, content: "a quick note".into(), ..Default::default() })
            .await
            .unwrap();

        let results = store.full_text_search("QUICK", agent_id, 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "a quick note");
    }

    #[tokio::test]
    async fn clear_with_no_session_removes_all_of_an_agents_memories() {
        let store = store();
        let agent_id = Uuid::now_v7();
        store.store(MemoryEntryDraft { agent_id, content: "a".into(), ..Default::default() }).await.unwrap();
        store.store(MemoryEntryDraft { agent_id, content: "b".into(), ..Default::default() }).await.unwrap();

        let removed = store.clear(agent_id, None).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count(agent_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn known_agent_ids_is_deduped_across_sessions() {
        let store = store();
        let agent_id = Uuid::now_v7();
        let session_a = Uuid::now_v7();
        let session_b = Uuid::now_v7();
        store.store_message(agent_id, session_a, "user", "hi", None).await.unwrap();
        store.store_message(agent_id, session_b, "user", "hi again", None).await.unwrap();
        store.store(MemoryEntryDraft { agent_id: Uuid::now_v7(), content: "other agent".into(), ..Default::default() }).await.unwrap();

        let ids = store.known_agent_ids().await;
        assert_eq!(ids.iter().filter(|&&id| id == agent_id).count(), 1);
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn spawn_consolidation_task_is_a_noop_when_auto_consolidation_disabled() {
        let mut config = MemoryConfig::default();
        config.auto_consolidation = false;
        let store = Arc::new(InProcessMemoryStore::with_config(
            Arc::new(HashEmbeddingProvider::default()),
            Arc::new(EventBus::new()),
            config,
        ));

        assert!(store.spawn_consolidation_task().is_none());
    }

    #[tokio::test]
    async fn spawn_consolidation_task_runs_when_auto_consolidation_enabled() {
        let mut config = MemoryConfig::default();
        config.consolidation_interval = std::time::Duration::from_millis(5);
        let store = Arc::new(InProcessMemoryStore::with_config(
            Arc::new(HashEmbeddingProvider::default()),
            Arc::new(EventBus::new()),
            config,
        ));

        let handle = store.spawn_consolidation_task().expect("auto consolidation enabled by default");
        assert!(!handle.is_finished());
        handle.abort();
    }
}
