//! Change Overlay
//!
//! Optimistic, not-yet-confirmed mutations kept on top of the tree store.
//! Every read path composes the store with the overlay, so the UI shows the
//! pending state before the backend answers. Composition produces new values
//! and never touches the store.

use std::collections::{HashMap, HashSet};

use crate::models::{Item, ItemId, ItemPatch};
use crate::tree::{sort_items, ChildOrder, Node, TreeStore};

#[derive(Debug, Clone, Default, PartialEq)]
struct Entry {
    patch: ItemPatch,
    removed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeOverlay {
    entries: HashMap<ItemId, Entry>,
}

impl ChangeOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.entries.keys().copied()
    }

    /// Record a patch; fields already patched for this id are overwritten
    pub fn apply(&mut self, id: ItemId, patch: ItemPatch) {
        self.entries.entry(id).or_default().patch.merge(patch);
    }

    /// Hide the item from the composed view
    pub fn mark_removed(&mut self, id: ItemId) {
        self.entries.entry(id).or_default().removed = true;
    }

    /// Undo a tombstone, keeping any field patches
    pub fn unmark_removed(&mut self, id: ItemId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.removed = false;
        }
        self.drop_if_empty(id);
    }

    pub fn is_removed(&self, id: ItemId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.removed)
    }

    pub fn patch(&self, id: ItemId) -> Option<&ItemPatch> {
        self.entries.get(&id).map(|e| &e.patch)
    }

    pub fn parent_override(&self, id: ItemId) -> Option<ItemId> {
        self.entries.get(&id).and_then(|e| e.patch.parent_id)
    }

    /// Put the parent override back to what it was before a move
    pub fn restore_parent(&mut self, id: ItemId, prior: Option<ItemId>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.patch.parent_id = prior;
        } else if let Some(parent_id) = prior {
            self.apply(id, ItemPatch::parent(parent_id));
        }
        self.drop_if_empty(id);
    }

    /// Remove the whole entry (backend confirmed it)
    pub fn clear(&mut self, id: ItemId) {
        self.entries.remove(&id);
    }

    fn drop_if_empty(&mut self, id: ItemId) {
        if self
            .entries
            .get(&id)
            .is_some_and(|e| !e.removed && e.patch.is_empty())
        {
            self.entries.remove(&id);
        }
    }

    /// Store item with the overlay applied, or None when tombstoned.
    /// The result has no children; see [`ChangeOverlay::compose_tree`].
    pub fn compose(&self, node: &Node) -> Option<Item> {
        let mut item = node.to_item();
        match self.entries.get(&node.id) {
            Some(entry) if entry.removed => return None,
            Some(entry) => {
                let patch = &entry.patch;
                if let Some(name) = &patch.name {
                    item.name = name.clone();
                }
                if let Some(url) = &patch.url {
                    item.url = Some(url.clone());
                }
                if let Some(info) = &patch.info {
                    item.info = Some(info.clone());
                }
            }
            None => {}
        }
        Some(item)
    }

    /// Parent as displayed: the pending move target if any, else the stored one
    pub fn effective_parent(&self, store: &TreeStore, id: ItemId) -> Option<ItemId> {
        self.parent_override(id).or_else(|| store.parent_of(id))
    }

    /// Displayed child ids of `parent`, before sorting
    fn effective_child_ids(&self, store: &TreeStore, parent: Option<ItemId>) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = store
            .child_ids(parent)
            .iter()
            .copied()
            .filter(|id| match self.parent_override(*id) {
                None => true,
                Some(moved_to) => Some(moved_to) == parent,
            })
            .collect();
        if let Some(folder) = parent {
            let mut moved_in: Vec<ItemId> = self
                .entries
                .iter()
                .filter(|(id, e)| e.patch.parent_id == Some(folder) && store.contains(**id))
                .map(|(id, _)| *id)
                .filter(|id| !ids.contains(id))
                .collect();
            moved_in.sort_unstable();
            ids.extend(moved_in);
        }
        ids
    }

    /// Displayed children of `parent` (None = root), recursively composed,
    /// with tombstoned items and their subtrees elided.
    pub fn compose_tree(&self, store: &TreeStore, parent: Option<ItemId>) -> Vec<Item> {
        let mut visiting = HashSet::new();
        if let Some(id) = parent {
            visiting.insert(id);
        }
        self.compose_level(store, parent, &mut visiting)
    }

    fn compose_level(
        &self,
        store: &TreeStore,
        parent: Option<ItemId>,
        visiting: &mut HashSet<ItemId>,
    ) -> Vec<Item> {
        let mut items = Vec::new();
        for id in self.effective_child_ids(store, parent) {
            // loop guard
            if !visiting.insert(id) {
                log::warn!("[TREE] Item {} reached twice while composing, skipped", id);
                continue;
            }
            if let Some(mut item) = store.get_item(id).and_then(|n| self.compose(n)) {
                if item.is_folder() {
                    item.children = self.compose_level(store, Some(id), visiting);
                }
                items.push(item);
            }
            visiting.remove(&id);
        }
        if store.order_of(parent) == ChildOrder::Collated {
            sort_items(&mut items);
        }
        items
    }

    /// Composed single item with its composed children
    pub fn compose_subtree(&self, store: &TreeStore, id: ItemId) -> Option<Item> {
        if !self.is_displayed(store, id) {
            return None;
        }
        let mut item = self.compose(store.get_item(id)?)?;
        if item.is_folder() {
            item.children = self.compose_tree(store, Some(id));
        }
        Some(item)
    }

    /// Whether the item and all its displayed ancestors exist and are not
    /// tombstoned
    pub fn is_displayed(&self, store: &TreeStore, id: ItemId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if !store.contains(cid) || self.is_removed(cid) || !seen.insert(cid) {
                return false;
            }
            current = self.effective_parent(store, cid);
        }
        true
    }
}
