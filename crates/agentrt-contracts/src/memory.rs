// Memory subsystem contracts: MemoryEntry, MemorySummary, knowledge documents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
    Working,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Conversation,
    Document,
    System,
    User,
    Knowledge,
}

/// A single retrievable memory unit. Embedding vectors live alongside this
/// row (see `MemoryStore` for vector handling); this type carries an
/// optional inline embedding for convenience at the contract layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub source: MemorySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub importance: f32,
    pub decay_factor: f32,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryEntry {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at.map(|exp| exp < now).unwrap_or(false)
    }
}

/// Partial memory fields supplied by callers of `MemoryStore::store`; the
/// store assigns id, timestamp, importance, and embedding where absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MemoryEntryDraft {
    pub agent_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,
    pub source: Option<MemorySource>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for MemoryType {
    fn default() -> Self {
        MemoryType::Episodic
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        MemorySource::System
    }
}

/// Rolling per-(agent, session) summary. Newer rows supersede older ones.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemorySummary {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub session_id: Uuid,
    pub summary: String,
    pub message_count: u64,
    pub key_points: Vec<String>,
    pub entities: Vec<String>,
    pub topics: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A document owned by an agent, deduplicated by content hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub content_hash: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One ordered chunk of a `KnowledgeDocument`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub content: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Result of `MemoryStore::consolidate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConsolidationReport {
    pub consolidated: u64,
    pub archived: u64,
    pub deleted: u64,
    pub errors: Vec<String>,
}

/// Aggregate statistics for `MemoryStore::getStats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryStats {
    pub total: u64,
    pub by_type: HashMap<String, u64>,
    pub by_source: HashMap<String, u64>,
    pub avg_importance: f32,
    pub avg_access_count: f32,
    #[serde(default)]
    pub earliest: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub latest: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entry_detection() {
        let now = chrono::Utc::now();
        let mut entry = MemoryEntry {
            id: Uuid::now_v7(),
            agent_id: Uuid::now_v7(),
            session_id: None,
            user_id: None,
            content: "x".into(),
            memory_type: MemoryType::Episodic,
            source: MemorySource::Conversation,
            embedding: None,
            importance: 0.5,
            decay_factor: 1.0,
            access_count: 0,
            last_accessed_at: None,
            timestamp: now,
            expires_at: None,
            metadata: HashMap::new(),
        };
        assert!(!entry.is_expired(now));
        entry.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(entry.is_expired(now));
    }
}
