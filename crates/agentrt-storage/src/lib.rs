//! Postgres-backed persistence for agents, sessions, and messages.
//! The in-process memory subsystem (`agentrt-memory`) owns its own tables;
//! this crate only speaks for the entities listed below.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{Result, StorageError};
pub use repository::{
    clamp_page_size, CreateAgentInput, CreateMessageInput, Database, UpdateAgentInput,
    DEFAULT_MESSAGE_PAGE_SIZE, MAX_MESSAGE_PAGE_SIZE,
};
