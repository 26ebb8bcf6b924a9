//! Bookmarks
//!
//! Single-owner aggregate of the interaction engine: tree store, change
//! overlay, selection, context menus, per-item gesture machines, drag session
//! and tree-view expansion. All reads go through the overlay; all methods are
//! synchronous. The only suspension point (the backend call of a move) lives
//! in [`crate::commands`].

use std::collections::{HashMap, HashSet};

use tree_dragdrop::DndState;
use uuid::Uuid;
use web_time::Instant;

use crate::config::EngineConfig;
use crate::context_menu::{ContextMenuCoordinator, OpenMenu};
use crate::gesture::{ClickContext, Gesture, GestureMachine, PointerInput};
use crate::models::{Item, ItemId, ItemKind, ItemPatch, Point};
use crate::overlay::ChangeOverlay;
use crate::selection::Selection;
use crate::transfer::{build_drag_preview, DragData, DragPreview};
use crate::tree::{flatten_tree, TreeResult, TreeRow, TreeStore};

/// What the UI should do after an item event
#[derive(Debug, Clone, PartialEq)]
pub enum ItemAction {
    None,
    OpenFolder(ItemId),
    OpenUrl(String),
    SelectionToggled { id: ItemId, selected: bool },
    ExpansionToggled { id: ItemId, expanded: bool },
    MenuOpened(OpenMenu),
    /// The click only closed an open menu
    MenuDismissed,
    /// Let the platform follow the link (new tab / window)
    PlatformDefault { href: String },
    /// Run the caller's own click handler
    Custom(ItemId),
}

/// Marker shown in front of the item icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessory {
    Selected,
    Expanded,
    Collapsed,
    None,
}

impl Accessory {
    pub fn glyph(&self) -> &'static str {
        match self {
            Accessory::Selected => "✓",
            Accessory::Expanded => "▼",
            Accessory::Collapsed => "▶",
            Accessory::None => "",
        }
    }
}

/// Entry of the navigational folder dropdown
#[derive(Debug, Clone, PartialEq)]
pub struct FolderOption {
    pub id: ItemId,
    pub name: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Bookmarks {
    pub(crate) config: EngineConfig,
    pub(crate) tree: TreeStore,
    pub(crate) overlay: ChangeOverlay,
    pub(crate) selection: Selection,
    menus: ContextMenuCoordinator,
    gestures: HashMap<ItemId, GestureMachine>,
    dnd: DndState<ItemId, DragData>,
    expanded: HashSet<ItemId>,
    /// Item id -> operation id of the move it belongs to
    pub(crate) in_flight: HashMap<ItemId, Uuid>,
}

impl Bookmarks {
    pub fn new(config: EngineConfig) -> Self {
        let dnd = DndState::new(config.drag_threshold_px);
        Self {
            config,
            dnd,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn overlay(&self) -> &ChangeOverlay {
        &self.overlay
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn menus(&self) -> &ContextMenuCoordinator {
        &self.menus
    }

    // ========================
    // Snapshots and composed reads
    // ========================

    /// Replace a folder's children (None = root) with a backend snapshot
    pub fn load_snapshot(&mut self, parent: Option<ItemId>, items: Vec<Item>) -> TreeResult<()> {
        let dropped = self.tree.replace_children(parent, items, self.config.child_order)?;
        for id in dropped {
            if !self.in_flight.contains_key(&id) {
                self.overlay.clear(id);
            }
        }
        self.prune_hidden();
        Ok(())
    }

    /// Forget client state of items that are no longer displayed
    fn prune_hidden(&mut self) {
        let tree = &self.tree;
        let overlay = &self.overlay;
        let shown = |id: ItemId| overlay.is_displayed(tree, id);
        self.selection.retain(shown);
        self.expanded.retain(|id| shown(*id));
        self.gestures.retain(|id, _| shown(*id));
        if let Some(item_id) = self.menus.current().map(|m| m.item_id) {
            if !shown(item_id) {
                self.menus.close(item_id);
            }
        }
    }

    pub fn is_displayed(&self, id: ItemId) -> bool {
        self.overlay.is_displayed(&self.tree, id)
    }

    /// Composed item without children
    pub fn item(&self, id: ItemId) -> Option<Item> {
        if !self.is_displayed(id) {
            return None;
        }
        self.overlay.compose(self.tree.get_item(id)?)
    }

    /// Composed children of a folder (None = root), recursively
    pub fn children(&self, parent: Option<ItemId>) -> Vec<Item> {
        if let Some(id) = parent {
            if !self.is_displayed(id) {
                return Vec::new();
            }
        }
        self.overlay.compose_tree(&self.tree, parent)
    }

    /// Visible rows of a tree view rooted at `parent`
    pub fn rows(&self, parent: Option<ItemId>) -> Vec<TreeRow> {
        flatten_tree(&self.children(parent), &self.expanded)
    }

    /// Every displayed folder, depth-first, for the folder dropdown
    pub fn folder_options(&self) -> Vec<FolderOption> {
        fn collect(items: &[Item], depth: usize, out: &mut Vec<FolderOption>) {
            for item in items.iter().filter(|i| i.is_folder()) {
                out.push(FolderOption {
                    id: item.id,
                    name: item.name.clone(),
                    depth,
                });
                collect(&item.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.children(None), 0, &mut out);
        out
    }

    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn toggle_expanded(&mut self, id: ItemId) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn accessory(&self, id: ItemId, expandable: bool) -> Accessory {
        if self.selection.is_selected(id) {
            return Accessory::Selected;
        }
        let has_children = self.item(id).is_some_and(|i| i.is_folder()) && !self.children(Some(id)).is_empty();
        match (expandable && has_children, self.is_expanded(id)) {
            (true, true) => Accessory::Expanded,
            (true, false) => Accessory::Collapsed,
            _ => Accessory::None,
        }
    }

    // ========================
    // Optimistic edits
    // ========================

    pub fn apply_patch(&mut self, id: ItemId, patch: ItemPatch) {
        self.overlay.apply(id, patch);
    }

    pub fn mark_removed(&mut self, id: ItemId) {
        self.overlay.mark_removed(id);
        self.prune_hidden();
    }

    pub fn unmark_removed(&mut self, id: ItemId) {
        self.overlay.unmark_removed(id);
    }

    /// Backend confirmed the pending edit of `id`
    pub fn confirm(&mut self, id: ItemId) {
        self.overlay.clear(id);
    }

    // ========================
    // Selection and clipboard
    // ========================

    /// Toggle selection of a displayed item. None if the item is not shown.
    pub fn toggle_select(&mut self, id: ItemId) -> Option<bool> {
        if !self.is_displayed(id) {
            log::debug!("[GESTURE] Ignoring selection of hidden item {}", id);
            return None;
        }
        Some(self.selection.toggle_select(id))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    /// Mark the selection (if `id` is in it) or just `id` as cut
    pub fn cut(&mut self, id: ItemId) -> Vec<ItemId> {
        let ids: Vec<ItemId> = self
            .selection
            .payload_for(id)
            .into_iter()
            .filter(|i| self.is_displayed(*i))
            .collect();
        self.selection.clear_cut();
        self.selection.mark_cut(ids.iter().copied());
        ids
    }

    pub fn clear_cut(&mut self) {
        self.selection.clear_cut();
    }

    // ========================
    // Gestures
    // ========================

    fn gesture_machine(&mut self, id: ItemId) -> &mut GestureMachine {
        let config = self.config.gesture();
        self.gestures.entry(id).or_insert_with(|| GestureMachine::new(config))
    }

    /// Advance long-press timers; returns items whose long press just fired
    pub fn poll_gestures(&mut self, now: Instant) -> Vec<ItemId> {
        let mut fired: Vec<ItemId> = self
            .gestures
            .iter_mut()
            .filter_map(|(id, m)| m.poll(now).then_some(*id))
            .collect();
        fired.sort_unstable();
        fired
    }

    /// Feed a raw input for one item and carry out the resolved gesture
    pub fn handle_input(
        &mut self,
        id: ItemId,
        input: PointerInput,
        ctx: ClickContext,
        now: Instant,
    ) -> ItemAction {
        let item = match self.item(id) {
            Some(item) => item,
            None => return ItemAction::None,
        };
        if matches!(input, PointerInput::Click(_)) && self.dnd.take_just_ended(now) {
            // the click that ends a drag
            return ItemAction::None;
        }

        let gesture = self.gesture_machine(id).handle(input, ctx, now);
        log::debug!("[GESTURE] {:?} on item {} -> {:?}", input, id, gesture);
        match gesture {
            Gesture::Ignored => ItemAction::None,
            Gesture::Open => self.open_item(&item),
            Gesture::ToggleSelect => self.toggle_action(id),
            Gesture::ContextMenu(at) => ItemAction::MenuOpened(self.open_menu(id, at)),
            Gesture::PlatformDefault => ItemAction::PlatformDefault { href: item.href() },
            Gesture::Custom => ItemAction::Custom(id),
        }
    }

    fn toggle_action(&mut self, id: ItemId) -> ItemAction {
        match self.toggle_select(id) {
            Some(selected) => ItemAction::SelectionToggled { id, selected },
            None => ItemAction::None,
        }
    }

    fn open_item(&mut self, item: &Item) -> ItemAction {
        if self.menus.close_all() {
            return ItemAction::MenuDismissed;
        }
        match item.kind {
            ItemKind::Folder => ItemAction::OpenFolder(item.id),
            ItemKind::Url => match &item.url {
                Some(url) => ItemAction::OpenUrl(url.clone()),
                None => {
                    log::warn!("[GESTURE] Bookmark {} has no url", item.id);
                    ItemAction::None
                }
            },
        }
    }

    fn open_menu(&mut self, id: ItemId, at: Point) -> OpenMenu {
        self.menus.open(id, at);
        OpenMenu { item_id: id, at }
    }

    /// The `⋮` button: open this item's menu without selecting or opening it
    pub fn menu_button(&mut self, id: ItemId, at: Point) -> ItemAction {
        if !self.is_displayed(id) {
            return ItemAction::None;
        }
        ItemAction::MenuOpened(self.open_menu(id, at))
    }

    pub fn close_menus(&mut self) -> bool {
        self.menus.close_all()
    }

    /// Click on the accessory/icon: deselect a selected item, else expand
    pub fn accessory_click(&mut self, id: ItemId) -> ItemAction {
        if !self.is_displayed(id) {
            return ItemAction::None;
        }
        if self.selection.is_selected(id) {
            return self.toggle_action(id);
        }
        let expanded = self.toggle_expanded(id);
        ItemAction::ExpansionToggled { id, expanded }
    }

    // ========================
    // Drag and drop
    // ========================

    /// Ids a drag starting on `id` carries, per the selection rule
    pub fn drag_payload(&self, id: ItemId) -> Vec<ItemId> {
        self.selection.payload_for(id)
    }

    /// Whether `target` takes a drop of `ids`
    pub fn accepts_drop(&self, target: ItemId, ids: &[ItemId]) -> bool {
        self.item(target).is_some_and(|t| t.kind.accepts_drop())
            && !ids.contains(&target)
            && self.reaching_ancestor(target, ids).is_none()
    }

    /// Start a drag on `id` (native drag start). The payload is captured now
    /// and stays fixed for this drag.
    pub fn start_drag(&mut self, id: ItemId) -> Option<DragData> {
        let item = self.item(id)?;
        let data = DragData::new(self.drag_payload(id), &item);
        if !self.dnd.begin(id, data.clone()) {
            return None;
        }
        if let Some(machine) = self.gestures.get_mut(&id) {
            machine.reset();
        }
        log::info!("[DND] Dragging {} item(s) from {}", data.ids.len(), id);
        Some(data)
    }

    /// Primary-button press on a row
    pub fn pointer_down(&mut self, id: ItemId, at: Point) {
        if self.is_displayed(id) {
            self.dnd.press(id, at);
        }
    }

    /// Finger down on a row: starts the long-press timer and a pending drag.
    /// Moving past the drag threshold (see [`Bookmarks::pointer_move`]) turns
    /// the touch into a drag and resets the gesture machine, so no long press
    /// fires for it.
    pub fn touch_start(&mut self, id: ItemId, at: Point, ctx: ClickContext, now: Instant) -> ItemAction {
        self.pointer_down(id, at);
        self.handle_input(id, PointerInput::TouchStart, ctx, now)
    }

    /// Pointer or finger moved; starts the drag once the threshold is crossed
    pub fn pointer_move(&mut self, at: Point) -> Option<DragData> {
        let source = self.dnd.motion(at)?;
        self.start_drag(source)
    }

    pub fn drag_enter(&mut self, target: ItemId) {
        let accepts = match self.dnd.payload() {
            Some(data) => self.accepts_drop(target, &data.ids),
            None => return,
        };
        self.dnd.enter(target, accepts);
    }

    pub fn drag_leave(&mut self) {
        self.dnd.leave();
    }

    pub fn drop_target(&self) -> Option<ItemId> {
        self.dnd.drop_target()
    }

    pub fn is_dragging(&self) -> bool {
        self.dnd.is_dragging()
    }

    /// Pointer released: (dragged ids, target folder) when this completes a drop
    pub fn release_drag(&mut self, now: Instant) -> Option<(Vec<ItemId>, ItemId)> {
        self.dnd.release(now).map(|(data, target)| (data.ids, target))
    }

    /// Discard the running drag. Also the platform's `dragend` hook for
    /// native drags, whose drop is read from the data transfer instead.
    pub fn cancel_drag(&mut self, now: Instant) -> bool {
        self.dnd.cancel(now)
    }

    /// Preview image for the drag in progress
    pub fn drag_preview(&self) -> Option<DragPreview> {
        self.dnd
            .payload()
            .map(|data| build_drag_preview(&data.preview_text, &self.config.preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Click;
    use std::time::Duration;

    fn bookmarks() -> Bookmarks {
        let mut b = Bookmarks::new(EngineConfig::default());
        b.load_snapshot(
            None,
            vec![
                Item::folder(1, "Folder 1").with_children(vec![Item::folder(2, "Folder in folder")]),
                Item::folder(3, "Other"),
                Item::url(4, "Rust", "https://www.rust-lang.org"),
            ],
        )
        .unwrap();
        b
    }

    fn click() -> PointerInput {
        PointerInput::Click(Click::primary(Point::new(1.0, 1.0)))
    }

    fn tree_ctx() -> ClickContext {
        ClickContext {
            expandable: true,
            custom_handler: false,
        }
    }

    #[test]
    fn test_tap_opens_folder() {
        let mut b = bookmarks();
        let t0 = Instant::now();
        let ctx = ClickContext::default();
        b.handle_input(1, PointerInput::TouchStart, ctx, t0);
        b.handle_input(1, PointerInput::TouchEnd, ctx, t0 + Duration::from_millis(50));
        assert_eq!(b.handle_input(1, click(), ctx, t0 + Duration::from_millis(60)), ItemAction::OpenFolder(1));
        assert!(!b.selection().is_selected(1));
    }

    #[test]
    fn test_long_press_toggles_selection_twice() {
        let mut b = bookmarks();
        let ctx = ClickContext::default();
        for expected in [true, false] {
            let t0 = Instant::now();
            b.handle_input(1, PointerInput::TouchStart, ctx, t0);
            b.handle_input(1, PointerInput::TouchEnd, ctx, t0 + Duration::from_millis(1000));
            assert_eq!(
                b.handle_input(1, click(), ctx, t0 + Duration::from_millis(1010)),
                ItemAction::SelectionToggled { id: 1, selected: expected }
            );
            assert_eq!(b.selection().is_selected(1), expected);
        }
    }

    #[test]
    fn test_click_that_closes_menu_does_not_open() {
        let mut b = bookmarks();
        let now = Instant::now();
        b.menu_button(3, Point::new(5.0, 5.0));
        assert_eq!(b.handle_input(1, click(), tree_ctx(), now), ItemAction::MenuDismissed);
        assert!(b.menus().current().is_none());
        assert_eq!(b.handle_input(1, click(), tree_ctx(), now), ItemAction::OpenFolder(1));
    }

    #[test]
    fn test_right_click_leaves_exactly_one_menu() {
        let mut b = bookmarks();
        let now = Instant::now();
        let ctx = ClickContext::default();
        b.handle_input(1, PointerInput::ContextMenu(Point::new(1.0, 1.0)), ctx, now);
        let action = b.handle_input(4, PointerInput::ContextMenu(Point::new(9.0, 9.0)), ctx, now);
        assert!(matches!(action, ItemAction::MenuOpened(OpenMenu { item_id: 4, .. })));
        assert!(b.menus().is_open_for(4));
        assert!(!b.menus().is_open_for(1));
    }

    #[test]
    fn test_url_click_outcomes() {
        let mut b = bookmarks();
        let now = Instant::now();
        assert_eq!(
            b.handle_input(4, click(), tree_ctx(), now),
            ItemAction::OpenUrl("https://www.rust-lang.org".to_string())
        );
        let meta = PointerInput::Click(Click::primary(Point::default()).with_modifiers(crate::gesture::Modifiers::META));
        assert_eq!(
            b.handle_input(4, meta, tree_ctx(), now),
            ItemAction::PlatformDefault {
                href: "https://www.rust-lang.org".to_string()
            }
        );
        let custom = ClickContext {
            expandable: false,
            custom_handler: true,
        };
        assert_eq!(b.handle_input(4, click(), custom, now), ItemAction::Custom(4));
    }

    #[test]
    fn test_expanding_reveals_child_once() {
        let mut b = bookmarks();
        let names = |b: &Bookmarks| b.rows(None).into_iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names(&b), vec!["Folder 1", "Other", "Rust"]);
        assert_eq!(b.accessory(1, true), Accessory::Collapsed);

        assert_eq!(b.accessory_click(1), ItemAction::ExpansionToggled { id: 1, expanded: true });
        assert_eq!(names(&b), vec!["Folder 1", "Folder in folder", "Other", "Rust"]);
        assert_eq!(b.accessory(1, true).glyph(), "▼");

        // same snapshot again must not duplicate anything
        b.load_snapshot(Some(1), vec![Item::folder(2, "Folder in folder")]).unwrap();
        assert_eq!(names(&b), vec!["Folder 1", "Folder in folder", "Other", "Rust"]);
    }

    #[test]
    fn test_accessory_click_deselects_selected() {
        let mut b = bookmarks();
        b.toggle_select(1);
        assert_eq!(b.accessory(1, true), Accessory::Selected);
        assert_eq!(b.accessory_click(1), ItemAction::SelectionToggled { id: 1, selected: false });
        assert!(!b.is_expanded(1));
    }

    #[test]
    fn test_folder_options() {
        let b = bookmarks();
        let options: Vec<(ItemId, usize)> = b.folder_options().iter().map(|o| (o.id, o.depth)).collect();
        assert_eq!(options, vec![(1, 0), (2, 1), (3, 0)]);
    }

    #[test]
    fn test_removal_prunes_selection() {
        let mut b = bookmarks();
        b.toggle_select(2);
        b.toggle_select(4);
        b.mark_removed(1);
        assert_eq!(b.selection().selected_ids(), vec![4]);
        assert!(b.item(2).is_none());
        assert_eq!(b.toggle_select(2), None);
    }

    #[test]
    fn test_snapshot_prunes_dropped_items() {
        let mut b = bookmarks();
        b.toggle_select(2);
        b.cut(2);
        b.load_snapshot(Some(1), vec![]).unwrap();
        assert!(b.selection().selected_ids().is_empty());
        assert!(b.selection().cut_ids().is_empty());
    }

    #[test]
    fn test_drag_payload_follows_selection() {
        let mut b = bookmarks();
        b.toggle_select(1);
        b.toggle_select(4);
        assert_eq!(b.drag_payload(4), vec![1, 4]);
        assert_eq!(b.drag_payload(3), vec![3]);
    }

    #[test]
    fn test_payload_is_captured_at_drag_start() {
        let mut b = bookmarks();
        b.toggle_select(1);
        b.toggle_select(4);
        b.pointer_down(4, Point::new(0.0, 0.0));
        assert!(b.pointer_move(Point::new(2.0, 2.0)).is_none());
        let data = b.pointer_move(Point::new(0.0, 30.0)).unwrap();
        assert_eq!(data.ids, vec![1, 4]);
        assert_eq!(b.drag_preview().unwrap().text, "[2 items]");

        // changing the selection mid-drag does not alter the payload
        b.toggle_select(1);
        b.drag_enter(3);
        let t0 = Instant::now();
        assert_eq!(b.release_drag(t0), Some((vec![1, 4], 3)));

        // the click fired at the drag origin is swallowed
        assert_eq!(
            b.handle_input(4, click(), tree_ctx(), t0 + Duration::from_millis(5)),
            ItemAction::None
        );
    }

    #[test]
    fn test_click_long_after_cancelled_drag_opens() {
        let mut b = bookmarks();
        b.pointer_down(1, Point::new(0.0, 0.0));
        b.pointer_move(Point::new(0.0, 30.0)).unwrap();
        let t0 = Instant::now();
        assert!(b.cancel_drag(t0));
        assert_eq!(
            b.handle_input(1, click(), tree_ctx(), t0 + Duration::from_secs(10)),
            ItemAction::OpenFolder(1)
        );
    }

    #[test]
    fn test_native_drags_in_a_row() {
        let mut b = bookmarks();
        let t0 = Instant::now();
        assert_eq!(b.start_drag(4).unwrap().ids, vec![4]);
        assert!(b.cancel_drag(t0));
        assert!(!b.is_dragging());
        assert_eq!(b.start_drag(3).unwrap().ids, vec![3]);
        assert!(b.cancel_drag(t0));

        // a later pointer drag still starts
        b.pointer_down(1, Point::new(0.0, 0.0));
        assert!(b.pointer_move(Point::new(0.0, 30.0)).is_some());
    }

    #[test]
    fn test_touch_drag_does_not_long_press() {
        let mut b = bookmarks();
        let t0 = Instant::now();
        let ctx = ClickContext::default();
        b.touch_start(1, Point::new(0.0, 0.0), ctx, t0);
        let data = b.pointer_move(Point::new(0.0, 30.0)).unwrap();
        assert_eq!(data.ids, vec![1]);
        assert!(b.poll_gestures(t0 + Duration::from_millis(1000)).is_empty());
        assert!(!b.selection().is_selected(1));
    }

    #[test]
    fn test_drop_targets() {
        let mut b = bookmarks();
        assert!(b.accepts_drop(3, &[1]));
        assert!(!b.accepts_drop(4, &[1]));
        assert!(!b.accepts_drop(1, &[1]));
        assert!(!b.accepts_drop(2, &[1]));

        b.start_drag(1).unwrap();
        b.drag_enter(2);
        assert_eq!(b.drop_target(), None);
        b.drag_enter(4);
        assert_eq!(b.drop_target(), None);
        let t0 = Instant::now();
        assert!(b.cancel_drag(t0));
        assert_eq!(b.release_drag(t0), None);
    }
}
