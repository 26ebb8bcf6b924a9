//! Backend Commands
//!
//! The backend collaborator and the async flows that drive it over the store.

mod item;
mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::models::{Item, ItemId};
use crate::moves::MoveOperation;

pub use item::*;
pub use memory::MemoryBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    Network(String),
    Rejected(String),
    Decode(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Network(msg) => write!(f, "Network error: {}", msg),
            BackendError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            BackendError::Decode(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Server side of the tree. Runs on the UI thread, so futures are not `Send`.
#[async_trait(?Send)]
pub trait ItemBackend {
    /// Reparent `op.ids` under `op.into_folder_id`. Replaying the same
    /// `op_id` must not apply the move twice.
    async fn move_items(&self, op: &MoveOperation) -> BackendResult<()>;

    /// Ordered children of a folder (None = root), with nested children
    async fn list_children(&self, folder: Option<ItemId>) -> BackendResult<Vec<Item>>;
}
