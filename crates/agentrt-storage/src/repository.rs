// Repository layer: agents, sessions, messages, and the tool/skill
// enablement join tables.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{AgentRow, MessageRow, SessionRow};
use agentrt_contracts::agent::{Agent, AgentConfig, AgentType};
use agentrt_contracts::message::{AgentMessage, MessageContent, MessageRole, ToolCallRequest};
use agentrt_contracts::session::AgentSession;

/// Default and maximum page size for message listing, per the external
/// interface's pagination contract.
pub const DEFAULT_MESSAGE_PAGE_SIZE: i64 = 50;
pub const MAX_MESSAGE_PAGE_SIZE: i64 = 200;

pub fn clamp_page_size(limit: Option<u32>) -> i64 {
    let requested = limit.unwrap_or(DEFAULT_MESSAGE_PAGE_SIZE as u32) as i64;
    requested.clamp(1, MAX_MESSAGE_PAGE_SIZE)
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ============================================
    // Agents
    // ============================================

    pub async fn create_agent(&self, owner_id: Uuid, req: CreateAgentInput) -> Result<Agent> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            INSERT INTO agents (id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'idle', $8, false)
            RETURNING id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(owner_id)
        .bind(req.public)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.avatar_url)
        .bind(agent_type_str(req.agent_type))
        .bind(Json(req.config))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_agent(&self, id: Uuid) -> Result<Agent> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted, created_at, updated_at
            FROM agents
            WHERE id = $1 AND NOT deleted
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StorageError::NotFound(id))
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted, created_at, updated_at
            FROM agents
            WHERE owner_id = $1 AND NOT deleted
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_public(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted, created_at, updated_at
            FROM agents
            WHERE public AND NOT deleted
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_agent(&self, id: Uuid, input: UpdateAgentInput) -> Result<Agent> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            UPDATE agents
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                avatar_url = COALESCE($4, avatar_url),
                public = COALESCE($5, public),
                config = COALESCE($6, config),
                updated_at = NOW()
            WHERE id = $1 AND NOT deleted
            RETURNING id, owner_id, public, name, description, avatar_url, agent_type, status, config, deleted, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name)
        .bind(input.description)
        .bind(input.avatar_url)
        .bind(input.public)
        .bind(input.config.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StorageError::NotFound(id))
    }

    pub async fn delete_agent(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE agents SET deleted = true, updated_at = NOW() WHERE id = $1 AND NOT deleted
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    // ============================================
    // Sessions
    // ============================================

    pub async fn create_session(
        &self,
        agent_id: Uuid,
        user_id: Uuid,
        req: agentrt_contracts::session::CreateSessionRequest,
    ) -> Result<AgentSession> {
        let metadata: serde_json::Map<String, serde_json::Value> = req.metadata.into_iter().collect();
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO agent_sessions (id, agent_id, user_id, title, metadata, last_activity_at, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, agent_id, user_id, title, metadata, last_activity_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(agent_id)
        .bind(user_id)
        .bind(req.title)
        .bind(Json(metadata))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_session(&self, id: Uuid) -> Result<AgentSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, agent_id, user_id, title, metadata, last_activity_at, created_at
            FROM agent_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StorageError::NotFound(id))
    }

    pub async fn list_sessions_for_agent(&self, agent_id: Uuid) -> Result<Vec<AgentSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, agent_id, user_id, title, metadata, last_activity_at, created_at
            FROM agent_sessions
            WHERE agent_id = $1
            ORDER BY last_activity_at DESC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn touch_session(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE agent_sessions SET last_activity_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM agent_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    // ============================================
    // Messages
    // ============================================

    pub async fn create_message(&self, input: CreateMessageInput) -> Result<AgentMessage> {
        let content = serde_json::to_value(&input.content).map_err(|e| StorageError::Conflict(e.to_string()))?;
        let tool_calls = input
            .tool_calls
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StorageError::Conflict(e.to_string()))?;
        let tokens = input.content.estimate_tokens() as i32;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO agent_messages (id, session_id, sequence, role, content, tool_calls, tool_call_id, tokens, created_at)
            VALUES ($1, $2, COALESCE((SELECT MAX(sequence) + 1 FROM agent_messages WHERE session_id = $2), 1), $3, $4, $5, $6, $7, NOW())
            RETURNING id, session_id, sequence, role, content, tool_calls, tool_call_id, tokens, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.session_id)
        .bind(crate::models::role_to_wire(input.role))
        .bind(content)
        .bind(tool_calls)
        .bind(input.tool_call_id)
        .bind(tokens)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_message(&self, id: Uuid) -> Result<AgentMessage> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, session_id, sequence, role, content, tool_calls, tool_call_id, tokens, created_at
            FROM agent_messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(StorageError::NotFound(id))
    }

    pub async fn list_messages(&self, session_id: Uuid, limit: Option<u32>, offset: u32) -> Result<Vec<AgentMessage>> {
        let page_size = clamp_page_size(limit);
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, session_id, sequence, role, content, tool_calls, tool_call_id, tokens, created_at
            FROM agent_messages
            WHERE session_id = $1
            ORDER BY sequence ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(session_id)
        .bind(page_size)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ============================================
    // Tools / skills
    // ============================================

    pub async fn add_tool(&self, agent_id: Uuid, tool_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_tools (agent_id, tool_name, enabled_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (agent_id, tool_name) DO NOTHING
            "#,
        )
        .bind(agent_id)
        .bind(tool_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_tools(&self, agent_id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT tool_name FROM agent_tools WHERE agent_id = $1 ORDER BY enabled_at ASC")
                .bind(agent_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn add_skill(&self, agent_id: Uuid, skill_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_skills (agent_id, skill_id, enabled_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (agent_id, skill_id) DO NOTHING
            "#,
        )
        .bind(agent_id)
        .bind(skill_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_skills(&self, agent_id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT skill_id FROM agent_skills WHERE agent_id = $1 ORDER BY enabled_at ASC")
                .bind(agent_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn agent_type_str(agent_type: AgentType) -> &'static str {
    crate::models::agent_type_to_wire(agent_type)
}

#[derive(Debug, Clone)]
pub struct CreateAgentInput {
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub agent_type: AgentType,
    pub public: bool,
    pub config: AgentConfig,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAgentInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub public: Option<bool>,
    pub config: Option<AgentConfig>,
}

#[derive(Debug, Clone)]
pub struct CreateMessageInput {
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub tool_call_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_caps() {
        assert_eq!(clamp_page_size(None), DEFAULT_MESSAGE_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(10)), 10);
        assert_eq!(clamp_page_size(Some(10_000)), MAX_MESSAGE_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
    }

    #[test]
    fn agent_type_round_trips_through_wire_strings() {
        for variant in [
            AgentType::Chat,
            AgentType::Task,
            AgentType::Knowledge,
            AgentType::Assistant,
            AgentType::Custom,
        ] {
            let wire = agent_type_str(variant);
            assert!(!wire.is_empty());
        }
    }
}
