//! Context Menu Coordinator
//!
//! Single owner of "which item menu is open". At most one menu is open at a
//! time across the whole UI.

use crate::models::{ItemId, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenMenu {
    pub item_id: ItemId,
    pub at: Point,
}

#[derive(Debug, Clone, Default)]
pub struct ContextMenuCoordinator {
    open: Option<OpenMenu>,
}

impl ContextMenuCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close whatever is open, then open the menu for `item_id` at `at`.
    /// Returns the menu that was replaced, if any.
    pub fn open(&mut self, item_id: ItemId, at: Point) -> Option<OpenMenu> {
        let replaced = self.open.take();
        if let Some(previous) = replaced {
            log::debug!("[MENU] Closing menu of item {}", previous.item_id);
        }
        log::debug!("[MENU] Opening menu of item {} at {}", item_id, at);
        self.open = Some(OpenMenu { item_id, at });
        replaced
    }

    /// Close every menu. True if one was actually open.
    pub fn close_all(&mut self) -> bool {
        self.open.take().is_some()
    }

    /// Close the menu if it belongs to `item_id`
    pub fn close(&mut self, item_id: ItemId) -> bool {
        if self.is_open_for(item_id) {
            self.open = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&OpenMenu> {
        self.open.as_ref()
    }

    pub fn is_open_for(&self, item_id: ItemId) -> bool {
        self.open.is_some_and(|m| m.item_id == item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_menu_replaces_first() {
        let mut menus = ContextMenuCoordinator::new();
        assert_eq!(menus.open(1, Point::new(10.0, 10.0)), None);
        let replaced = menus.open(2, Point::new(50.0, 60.0)).unwrap();
        assert_eq!(replaced.item_id, 1);

        assert!(!menus.is_open_for(1));
        assert!(menus.is_open_for(2));
        assert_eq!(menus.current().unwrap().at, Point::new(50.0, 60.0));
    }

    #[test]
    fn test_close_all_reports_whether_anything_closed() {
        let mut menus = ContextMenuCoordinator::new();
        assert!(!menus.close_all());
        menus.open(1, Point::default());
        assert!(menus.close_all());
        assert!(menus.current().is_none());
    }

    #[test]
    fn test_close_only_matching_item() {
        let mut menus = ContextMenuCoordinator::new();
        menus.open(1, Point::default());
        assert!(!menus.close(2));
        assert!(menus.close(1));
    }
}
