// Error taxonomy for the runtime. Kinds map 1:1 onto the platform's error
// codes; HTTP translation happens at the API layer.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("runtime not ready: {0}")]
    RuntimeNotReady(String),

    #[error("runtime busy: {0}")]
    RuntimeBusy(String),

    #[error("tool failed: {0}")]
    ToolFailed(String),

    #[error("skill failed: {0}")]
    SkillFailed(String),

    #[error("llm upstream error: {0}")]
    LlmUpstream(String),

    #[error("memory backend error: {0}")]
    MemoryBackend(String),

    #[error("iteration cap exceeded ({0})")]
    IterationExceeded(usize),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RuntimeError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        RuntimeError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        RuntimeError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RuntimeError::Conflict(msg.into())
    }

    pub fn runtime_not_ready(msg: impl Into<String>) -> Self {
        RuntimeError::RuntimeNotReady(msg.into())
    }

    pub fn runtime_busy(msg: impl Into<String>) -> Self {
        RuntimeError::RuntimeBusy(msg.into())
    }

    pub fn tool_failed(msg: impl Into<String>) -> Self {
        RuntimeError::ToolFailed(msg.into())
    }

    pub fn skill_failed(msg: impl Into<String>) -> Self {
        RuntimeError::SkillFailed(msg.into())
    }

    pub fn llm_upstream(msg: impl Into<String>) -> Self {
        RuntimeError::LlmUpstream(msg.into())
    }

    pub fn memory_backend(msg: impl Into<String>) -> Self {
        RuntimeError::MemoryBackend(msg.into())
    }

    pub fn agent_not_found(agent_id: Uuid) -> Self {
        RuntimeError::NotFound(format!("agent {agent_id}"))
    }

    pub fn runtime_not_found(runtime_id: Uuid) -> Self {
        RuntimeError::NotFound(format!("runtime {runtime_id}"))
    }

    /// Stable error code, matching the platform's error taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::BadRequest(_) => "EBAD_REQUEST",
            RuntimeError::NotFound(_) => "ENOT_FOUND",
            RuntimeError::Conflict(_) => "ECONFLICT",
            RuntimeError::RuntimeNotReady(_) => "ERUNTIME_NOT_READY",
            RuntimeError::RuntimeBusy(_) => "ERUNTIME_BUSY",
            RuntimeError::ToolFailed(_) => "ETOOL_FAILED",
            RuntimeError::SkillFailed(_) => "ESKILL_FAILED",
            RuntimeError::LlmUpstream(_) => "ELLM_UPSTREAM",
            RuntimeError::MemoryBackend(_) => "EMEMORY_BACKEND",
            RuntimeError::IterationExceeded(_) => "EITER_EXCEEDED",
            RuntimeError::Cancelled => "ECANCELLED",
            RuntimeError::Internal(_) => "EINTERNAL",
        }
    }
}
