//! Item Commands
//!
//! Async flows over the app store: snapshot refresh and the optimistic move
//! (drag-and-drop, paste).

use leptos::prelude::*;
use web_time::Instant;

use crate::commands::{BackendError, BackendResult, ItemBackend};
use crate::models::{count, ItemId};
use crate::moves::{ConfirmMove, MoveError, MoveReport};
use crate::store::{store_push_notice, AppStateStoreFields, AppStore, Notice};
use crate::transfer::{ids_from_transfer, TransferError};

/// Fetch a folder's children and reconcile them into the store
pub async fn refresh_children(
    store: &AppStore,
    backend: &dyn ItemBackend,
    folder: Option<ItemId>,
) -> BackendResult<()> {
    let items = backend.list_children(folder).await?;
    let field = store.bookmarks();
    let mut bookmarks = field.write();
    bookmarks
        .load_snapshot(folder, items)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

fn reject(store: &AppStore, e: MoveError) -> MoveError {
    if !e.is_silent() {
        log::warn!("[MOVE] Rejected: {}", e);
        store_push_notice(store, Notice::error(e.to_string()));
    }
    e
}

/// Move `ids` into `into_folder_id`.
///
/// The store is not locked while the user confirms. The move is then applied
/// to the overlay before calling the backend. On success the affected folders
/// are refetched and the overlay cleared in the same update; on failure the
/// overlay is rolled back and a notice is pushed.
pub async fn move_items(
    store: &AppStore,
    backend: &dyn ItemBackend,
    ids: &[ItemId],
    into_folder_id: ItemId,
    confirm: &dyn ConfirmMove,
) -> Result<MoveReport, MoveError> {
    let field = store.bookmarks();
    let request = field
        .with_untracked(|b| b.validate_move(ids, into_folder_id))
        .map_err(|e| reject(store, e))?;
    if !confirm.confirm(&request) {
        log::debug!("[MOVE] Declined: {}", request.prompt());
        return Err(MoveError::Declined);
    }
    let applied = field.write().apply_move(&request);
    let pending = applied.map_err(|e| reject(store, e))?;

    if let Err(e) = backend.move_items(&pending.operation).await {
        let result = field.write().settle_move(pending, Err(e));
        if let Err(e) = &result {
            store_push_notice(store, Notice::error(e.to_string()));
        }
        return result;
    }

    let mut snapshots = Vec::with_capacity(pending.affected.len());
    for folder in &pending.affected {
        match backend.list_children(*folder).await {
            Ok(items) => snapshots.push((*folder, items)),
            Err(e) => log::warn!("[MOVE] Refetch of {:?} failed: {}", folder, e),
        }
    }

    let report = {
        let mut bookmarks = field.write();
        for (folder, items) in snapshots {
            if let Err(e) = bookmarks.load_snapshot(folder, items) {
                log::warn!("[MOVE] Snapshot of {:?} not applied: {}", folder, e);
            }
        }
        bookmarks.settle_move(pending, Ok(()))?
    };
    store_push_notice(
        store,
        Notice::info(format!(
            "Moved {} into \"{}\"",
            count("item", report.moved.len()),
            request.folder_name
        )),
    );
    Ok(report)
}

/// Move the cut items into `folder`
pub async fn paste_into(
    store: &AppStore,
    backend: &dyn ItemBackend,
    folder: ItemId,
    confirm: &dyn ConfirmMove,
) -> Result<MoveReport, MoveError> {
    let ids = store.bookmarks().with_untracked(|b| b.selection().cut_ids());
    move_items(store, backend, &ids, folder, confirm).await
}

/// Finish the pointer drag in progress. None when the release was not over a
/// drop target.
pub async fn drop_dragged(
    store: &AppStore,
    backend: &dyn ItemBackend,
    now: Instant,
    confirm: &dyn ConfirmMove,
) -> Option<Result<MoveReport, MoveError>> {
    let released = store.bookmarks().write().release_drag(now);
    let (ids, target) = released?;
    Some(move_items(store, backend, &ids, target, confirm).await)
}

/// Handle a platform drop on `folder` carrying a data transfer, possibly from
/// another window. Ends any native drag started in this view. None when the
/// transfer holds no item ids.
pub async fn drop_transfer(
    store: &AppStore,
    backend: &dyn ItemBackend,
    folder: ItemId,
    get: impl Fn(&str) -> Option<String>,
    now: Instant,
    confirm: &dyn ConfirmMove,
) -> Option<Result<MoveReport, MoveError>> {
    store.bookmarks().write().cancel_drag(now);
    let ids = match ids_from_transfer(get) {
        Ok(ids) => ids,
        Err(TransferError::MissingIds) => return None,
        Err(e) => {
            log::warn!("[DND] {}", e);
            return None;
        }
    };
    if ids.contains(&folder) {
        return None;
    }
    Some(move_items(store, backend, &ids, folder, confirm).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MemoryBackend;
    use crate::config::EngineConfig;
    use crate::models::{Item, Point};
    use crate::moves::MoveRequest;
    use crate::store::{provide_app_store, store_take_notices, AppState};
    use leptos::prelude::*;

    fn seed() -> Vec<Item> {
        vec![
            Item::folder(1, "Folder 1").with_children(vec![Item::folder(2, "Folder in folder")]),
            Item::folder(3, "Other"),
            Item::url(4, "Rust", "https://www.rust-lang.org"),
        ]
    }

    /// The owner must outlive the test or the store is disposed
    async fn setup() -> (Owner, AppStore, MemoryBackend) {
        let owner = Owner::new();
        owner.set();
        let store = provide_app_store(AppState::new(EngineConfig::default()));
        let backend = MemoryBackend::new(seed());
        refresh_children(&store, &backend, None).await.unwrap();
        (owner, store, backend)
    }

    fn yes(_: &MoveRequest) -> bool {
        true
    }

    fn child_ids(store: &AppStore, parent: Option<ItemId>) -> Vec<ItemId> {
        store
            .bookmarks()
            .with_untracked(|b| b.children(parent).iter().map(|i| i.id).collect())
    }

    #[tokio::test]
    async fn test_move_success_reconciles_and_clears_overlay() {
        let (_owner, store, backend) = setup().await;
        let report = move_items(&store, &backend, &[4], 3, &yes).await.unwrap();
        assert_eq!(report.moved, vec![4]);
        assert_eq!(child_ids(&store, Some(3)), vec![4]);
        assert_eq!(child_ids(&store, None), vec![1, 3]);
        assert!(store.bookmarks().with_untracked(|b| b.overlay().is_empty()));
        assert_eq!(store.bookmarks().with_untracked(|b| b.tree().parent_of(4)), Some(3));

        let notices = store_take_notices(&store);
        assert_eq!(notices, vec![Notice::info("Moved 1 item into \"Other\"")]);
    }

    #[tokio::test]
    async fn test_confirm_can_read_the_store() {
        let (_owner, store, backend) = setup().await;
        let confirm = |request: &MoveRequest| {
            store
                .bookmarks()
                .with_untracked(|b| b.item(request.into_folder_id).is_some_and(|f| f.is_folder()))
        };
        let report = move_items(&store, &backend, &[4], 3, &confirm).await.unwrap();
        assert_eq!(report.into_folder_id, 3);
        assert_eq!(backend.parent_of(4).await, Some(3));
    }

    #[tokio::test]
    async fn test_move_failure_rolls_back_with_notice() {
        let (_owner, store, backend) = setup().await;
        backend.fail_next(BackendError::Network("offline".to_string())).await;
        let err = move_items(&store, &backend, &[4], 3, &yes).await.unwrap_err();
        assert!(matches!(err, MoveError::Backend(BackendError::Network(_))));
        assert_eq!(child_ids(&store, None), vec![1, 3, 4]);
        assert!(child_ids(&store, Some(3)).is_empty());
        assert!(store.bookmarks().with_untracked(|b| b.overlay().is_empty()));
        assert_eq!(store_take_notices(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_declined_move_never_reaches_backend() {
        let (_owner, store, backend) = setup().await;
        let err = move_items(&store, &backend, &[4], 3, &|_: &MoveRequest| false)
            .await
            .unwrap_err();
        assert_eq!(err, MoveError::Declined);
        assert_eq!(backend.move_calls().await, 0);
        assert!(store_take_notices(&store).is_empty());
    }

    #[tokio::test]
    async fn test_descendant_move_is_rejected_locally() {
        let (_owner, store, backend) = setup().await;
        let err = move_items(&store, &backend, &[1], 2, &yes).await.unwrap_err();
        assert!(matches!(err, MoveError::IntoDescendant { .. }));
        assert_eq!(backend.move_calls().await, 0);
        assert_eq!(store_take_notices(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_cut_and_paste() {
        let (_owner, store, backend) = setup().await;
        store.bookmarks().write().toggle_select(3);
        store.bookmarks().write().toggle_select(4);
        assert_eq!(store.bookmarks().write().cut(4), vec![3, 4]);

        let report = paste_into(&store, &backend, 2, &yes).await.unwrap();
        assert_eq!(report.moved, vec![3, 4]);
        assert_eq!(child_ids(&store, Some(2)), vec![3, 4]);
        assert!(store.bookmarks().with_untracked(|b| b.selection().cut_ids().is_empty()));
    }

    #[tokio::test]
    async fn test_pointer_drag_drop() {
        let (_owner, store, backend) = setup().await;
        {
            let field = store.bookmarks();
            let mut bookmarks = field.write();
            bookmarks.pointer_down(4, Point::new(0.0, 0.0));
            assert!(bookmarks.pointer_move(Point::new(0.0, 20.0)).is_some());
            bookmarks.drag_enter(1);
        }
        let now = Instant::now();
        let report = drop_dragged(&store, &backend, now, &yes).await.unwrap().unwrap();
        assert_eq!(report.into_folder_id, 1);
        assert_eq!(backend.parent_of(4).await, Some(1));
        assert_eq!(child_ids(&store, Some(1)), vec![2, 4]);

        // nothing left to drop
        assert!(drop_dragged(&store, &backend, now, &yes).await.is_none());
    }

    #[tokio::test]
    async fn test_transfer_drop() {
        let (_owner, store, backend) = setup().await;
        let now = Instant::now();
        let data = store.bookmarks().write().start_drag(4).unwrap();
        let transfer: Vec<(&str, String)> = data.entries();
        let get = |key: &str| transfer.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());

        let report = drop_transfer(&store, &backend, 3, get, now, &yes).await.unwrap().unwrap();
        assert_eq!(report.moved, vec![4]);
        assert!(!store.bookmarks().with_untracked(|b| b.is_dragging()));

        // the next native drag starts fresh
        assert!(store.bookmarks().write().start_drag(1).is_some());
        assert!(drop_transfer(&store, &backend, 3, |_: &str| None, now, &yes).await.is_none());
        assert!(!store.bookmarks().with_untracked(|b| b.is_dragging()));
    }
}
