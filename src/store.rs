//! Global Application State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity.

use leptos::prelude::*;
use reactive_stores::Store;

use crate::bookmarks::Bookmarks;
use crate::config::EngineConfig;
use crate::models::{Item, ItemId};
use crate::tree::TreeResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message for the user, shown once by the UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Global application state with field-level reactivity
#[derive(Clone, Debug, Default, Store)]
pub struct AppState {
    /// Tree, overlay, selection, menus and drag state
    pub bookmarks: Bookmarks,
    /// Folder shown in the main list (None = root)
    pub current_folder: Option<ItemId>,
    /// Pending user-visible messages
    pub notices: Vec<Notice>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            bookmarks: Bookmarks::new(config),
            ..Default::default()
        }
    }
}

/// Type alias for the store
pub type AppStore = Store<AppState>;

/// Get the app store from context
pub fn use_app_store() -> AppStore {
    expect_context::<AppStore>()
}

/// Create the store and put it into context
pub fn provide_app_store(state: AppState) -> AppStore {
    let store = Store::new(state);
    provide_context(store);
    store
}

// ========================
// Store Helper Functions
// ========================

/// Reconcile a folder's children with a backend snapshot
pub fn store_load_snapshot(store: &AppStore, parent: Option<ItemId>, items: Vec<Item>) -> TreeResult<()> {
    store.bookmarks().write().load_snapshot(parent, items)
}

/// Show another folder. Returns false if it is not a displayed folder.
pub fn store_navigate(store: &AppStore, folder: Option<ItemId>) -> bool {
    if let Some(id) = folder {
        let is_folder = store
            .bookmarks()
            .with_untracked(|b| b.item(id).is_some_and(|i| i.is_folder()));
        if !is_folder {
            log::warn!("[TREE] Cannot navigate to {}: not a folder", id);
            return false;
        }
    }
    store.bookmarks().write().close_menus();
    store.current_folder().set(folder);
    true
}

pub fn store_push_notice(store: &AppStore, notice: Notice) {
    store.notices().write().push(notice);
}

/// Drain pending notices
pub fn store_take_notices(store: &AppStore) -> Vec<Notice> {
    std::mem::take(&mut *store.notices().write())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The owner must outlive the test or the store is disposed
    fn store() -> (Owner, AppStore) {
        let owner = Owner::new();
        owner.set();
        let store = provide_app_store(AppState::new(EngineConfig::default()));
        store_load_snapshot(
            &store,
            None,
            vec![
                Item::folder(1, "Folder 1").with_children(vec![Item::folder(2, "Folder in folder")]),
                Item::url(3, "Rust", "https://www.rust-lang.org"),
            ],
        )
        .unwrap();
        (owner, store)
    }

    #[test]
    fn test_navigate() {
        let (_owner, store) = store();
        assert!(store_navigate(&store, Some(2)));
        assert_eq!(store.current_folder().get_untracked(), Some(2));
        assert!(!store_navigate(&store, Some(3)));
        assert!(!store_navigate(&store, Some(42)));
        assert_eq!(store.current_folder().get_untracked(), Some(2));
        assert!(store_navigate(&store, None));
        assert_eq!(store.current_folder().get_untracked(), None);
    }

    #[test]
    fn test_context_provides_store() {
        let (_owner, store) = store();
        let from_context = use_app_store();
        let names = from_context
            .bookmarks()
            .with_untracked(|b| b.children(None).iter().map(|i| i.name.clone()).collect::<Vec<_>>());
        assert_eq!(names, vec!["Folder 1", "Rust"]);
        assert_eq!(store.bookmarks().with_untracked(|b| b.tree().len()), 3);
    }

    #[test]
    fn test_notices_are_drained() {
        let (_owner, store) = store();
        store_push_notice(&store, Notice::error("Move failed"));
        store_push_notice(&store, Notice::info("Moved"));
        let notices = store_take_notices(&store);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(store_take_notices(&store).is_empty());
    }
}
