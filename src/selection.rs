//! Selection & Clipboard
//!
//! Client-local selected set and cut set. Both are plain sets mutated
//! synchronously by user gestures; the cut set only drives the "dimmed"
//! visual cue until a move commits.

use std::collections::BTreeSet;

use crate::models::ItemId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: BTreeSet<ItemId>,
    cut: BTreeSet<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership; returns whether the item is now selected
    pub fn toggle_select(&mut self, id: ItemId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selected.contains(&id)
    }

    /// Selected ids in ascending order
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected.iter().copied().collect()
    }

    pub fn selected_len(&self) -> usize {
        self.selected.len()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn mark_cut(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.cut.extend(ids);
    }

    pub fn clear_cut(&mut self) {
        self.cut.clear();
    }

    /// Drop the given ids from the cut set (they were moved)
    pub fn unmark_cut(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.cut.remove(id);
        }
    }

    pub fn is_cut(&self, id: ItemId) -> bool {
        self.cut.contains(&id)
    }

    pub fn cut_ids(&self) -> Vec<ItemId> {
        self.cut.iter().copied().collect()
    }

    /// Ids affected by an action on `id`: the whole selection if `id` is part
    /// of it, otherwise just `id`.
    pub fn payload_for(&self, id: ItemId) -> Vec<ItemId> {
        if self.is_selected(id) {
            self.selected_ids()
        } else {
            vec![id]
        }
    }

    /// Forget ids that are no longer displayed
    pub fn retain(&mut self, mut keep: impl FnMut(ItemId) -> bool) {
        self.selected.retain(|id| keep(*id));
        self.cut.retain(|id| keep(*id));
    }
}
