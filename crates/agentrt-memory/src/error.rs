// Memory subsystem error taxonomy, chaining into the runtime's taxonomy at
// the `agentrt-core::RuntimeError::MemoryBackend` variant.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory not found: {0}")]
    NotFound(Uuid),

    #[error("embedding backend error: {0}")]
    Embedding(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<MemoryError> for agentrt_core::error::RuntimeError {
    fn from(err: MemoryError) -> Self {
        agentrt_core::error::RuntimeError::memory_backend(err.to_string())
    }
}
