//! Bookmark Tree
//!
//! Interaction engine for a bookmark tree: reconciled tree store, optimistic
//! change overlay, selection and clipboard, drag-and-drop moves, touch/pointer
//! gesture disambiguation and a single-menu context menu coordinator.

pub mod bookmarks;
pub mod commands;
pub mod config;
pub mod context_menu;
pub mod gesture;
pub mod models;
pub mod moves;
pub mod overlay;
pub mod selection;
pub mod store;
pub mod transfer;
pub mod tree;

use std::path::Path;

pub use bookmarks::{Accessory, Bookmarks, FolderOption, ItemAction};
pub use commands::{BackendError, BackendResult, ItemBackend, MemoryBackend};
pub use config::{ConfigError, EngineConfig};
pub use models::{Item, ItemId, ItemKind, ItemPatch, Point};
pub use moves::{ConfirmMove, MoveError, MoveOperation, MoveReport, MoveRequest};
pub use store::{AppState, AppStore, Notice, NoticeLevel};
pub use tree::{ChildOrder, TreeError, TreeStore};

/// Send `log` output to `<dir>/Bookmarks.log` with rotation
pub fn init_logging(dir: impl AsRef<Path>) -> Result<(), rolling_logger::LoggerError> {
    rolling_logger::init_logger(dir, "Bookmarks")?;
    log::info!("Logging initialized");
    Ok(())
}
