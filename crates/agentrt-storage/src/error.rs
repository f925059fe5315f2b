// Storage error taxonomy, chaining into the runtime's at EMEMORY_BACKEND's
// sibling code path: storage failures surface as EBAD_REQUEST/ENOT_FOUND or
// fall through to the runtime's internal error.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StorageError> for agentrt_core::error::RuntimeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => agentrt_core::error::RuntimeError::not_found(format!("{id}")),
            StorageError::Conflict(msg) => agentrt_core::error::RuntimeError::conflict(msg),
            StorageError::Database(e) => agentrt_core::error::RuntimeError::Internal(e.into()),
        }
    }
}
