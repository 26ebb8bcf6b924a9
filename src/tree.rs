//! Tree Store
//!
//! Canonical item tree as last received from the backend, kept as a flat
//! arena keyed by id with children referenced by id. The store is never
//! edited field by field: a folder's children are replaced wholesale when a
//! new snapshot for that folder arrives.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use pinyin::ToPinyin;
use serde::{Deserialize, Serialize};

use crate::models::{Item, ItemId, ItemKind};

/// How a folder's children are ordered when read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildOrder {
    /// Folders before bookmarks, then by name
    #[default]
    Collated,
    /// Exactly as the backend sent them
    Backend,
}

/// One stored item. Children are ids; only folders have any.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub url: Option<String>,
    pub info: Option<String>,
    /// None = root level
    pub parent_id: Option<ItemId>,
    pub children: Vec<ItemId>,
}

impl Node {
    /// Shallow item (no children)
    pub fn to_item(&self) -> Item {
        Item {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            url: self.url.clone(),
            info: self.info.clone(),
            children: Vec::new(),
        }
    }
}

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    UnknownFolder(ItemId),
    NotAFolder(ItemId),
    DuplicateId(ItemId),
    UrlWithChildren(ItemId),
    /// The snapshot would place an item inside its own subtree
    Cycle(ItemId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::UnknownFolder(id) => write!(f, "Folder {} not found", id),
            TreeError::NotAFolder(id) => write!(f, "Item {} is not a folder", id),
            TreeError::DuplicateId(id) => write!(f, "Item {} appears twice in snapshot", id),
            TreeError::UrlWithChildren(id) => write!(f, "Bookmark {} has children", id),
            TreeError::Cycle(id) => write!(f, "Item {} would become its own ancestor", id),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    nodes: HashMap<ItemId, Node>,
    roots: Vec<ItemId>,
    order: HashMap<Option<ItemId>, ChildOrder>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get_item(&self, id: ItemId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(&id).and_then(|n| n.parent_id)
    }

    pub fn order_of(&self, parent: Option<ItemId>) -> ChildOrder {
        self.order.get(&parent).copied().unwrap_or_default()
    }

    /// Child ids in the order the backend sent them
    pub fn child_ids(&self, parent: Option<ItemId>) -> &[ItemId] {
        match parent {
            None => &self.roots,
            Some(id) => self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[]),
        }
    }

    /// Ordered children of a folder (None = root)
    pub fn get_children(&self, parent: Option<ItemId>) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .child_ids(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect();
        if self.order_of(parent) == ChildOrder::Collated {
            children.sort_by(|a, b| collate(a.kind, &a.name, b.kind, &b.name));
        }
        children
    }

    /// Whether `id` sits somewhere below `ancestor`
    pub fn is_descendant_of(&self, id: ItemId, ancestor: ItemId) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// Replace the children of `parent` (None = root) with a snapshot.
    ///
    /// Nested `children` in the snapshot are authoritative for those folders
    /// too. Items that were under `parent` and are missing from the snapshot
    /// are dropped together with their descendants. Returns the ids that are no
    /// longer in the store.
    pub fn replace_children(
        &mut self,
        parent: Option<ItemId>,
        items: Vec<Item>,
        order: ChildOrder,
    ) -> TreeResult<Vec<ItemId>> {
        self.validate_snapshot(parent, &items)?;

        let mut dropped = Vec::new();
        let old_children = std::mem::take(self.children_mut(parent));
        for id in old_children {
            self.remove_subtree(id, &mut dropped);
        }

        // Items that moved here from elsewhere leave their old folder
        let mut incoming = Vec::new();
        collect_ids(&items, &mut incoming);
        for id in &incoming {
            if self.nodes.contains_key(id) {
                self.detach(*id);
                self.remove_subtree(*id, &mut dropped);
            }
        }

        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        for item in items {
            self.insert(parent, item);
        }
        *self.children_mut(parent) = ids;
        self.order.insert(parent, order);

        let incoming: HashSet<ItemId> = incoming.into_iter().collect();
        dropped.retain(|id| !incoming.contains(id));
        log::debug!(
            "[TREE] Snapshot for {:?}: {} items, {} dropped",
            parent,
            incoming.len(),
            dropped.len()
        );
        Ok(dropped)
    }

    fn validate_snapshot(&self, parent: Option<ItemId>, items: &[Item]) -> TreeResult<()> {
        if let Some(pid) = parent {
            let node = self.nodes.get(&pid).ok_or(TreeError::UnknownFolder(pid))?;
            if node.kind != ItemKind::Folder {
                return Err(TreeError::NotAFolder(pid));
            }
        }

        let mut seen = HashSet::new();
        let mut stack: Vec<&Item> = items.iter().collect();
        while let Some(item) = stack.pop() {
            if !seen.insert(item.id) {
                return Err(TreeError::DuplicateId(item.id));
            }
            if item.kind == ItemKind::Url && !item.children.is_empty() {
                return Err(TreeError::UrlWithChildren(item.id));
            }
            if let Some(pid) = parent {
                if item.id == pid || self.is_descendant_of(pid, item.id) {
                    return Err(TreeError::Cycle(item.id));
                }
            }
            stack.extend(item.children.iter());
        }
        Ok(())
    }

    fn children_mut(&mut self, parent: Option<ItemId>) -> &mut Vec<ItemId> {
        match parent.and_then(|id| self.nodes.get_mut(&id)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    fn detach(&mut self, id: ItemId) {
        let parent = self.parent_of(id);
        self.children_mut(parent).retain(|c| *c != id);
    }

    fn remove_subtree(&mut self, id: ItemId, dropped: &mut Vec<ItemId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                dropped.push(current);
                stack.extend(node.children);
                self.order.remove(&Some(current));
            }
        }
    }

    fn insert(&mut self, parent: Option<ItemId>, item: Item) {
        let Item {
            id,
            kind,
            name,
            url,
            info,
            children,
        } = item;
        let child_ids = children.iter().map(|c| c.id).collect();
        self.nodes.insert(
            id,
            Node {
                id,
                kind,
                name,
                url,
                info,
                parent_id: parent,
                children: child_ids,
            },
        );
        for child in children {
            self.insert(Some(id), child);
        }
    }
}

fn collect_ids(items: &[Item], out: &mut Vec<ItemId>) {
    for item in items {
        out.push(item.id);
        collect_ids(&item.children, out);
    }
}

// ========================
// Collation
// ========================

/// Sort key for a name: lowercase, with CJK characters spelled in pinyin
pub fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars() {
        match c.to_pinyin() {
            Some(p) => key.push_str(p.plain()),
            None => key.extend(c.to_lowercase()),
        }
    }
    key
}

/// Folders before bookmarks, then by collated name
pub fn collate(a_kind: ItemKind, a_name: &str, b_kind: ItemKind, b_name: &str) -> Ordering {
    a_kind
        .cmp(&b_kind)
        .then_with(|| collation_key(a_name).cmp(&collation_key(b_name)))
}

/// Stable collated sort; equal keys keep their incoming order
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| collate(a.kind, &a.name, b.kind, &b.name));
}

// ========================
// Row flattening
// ========================

/// One visible row of a tree view
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    pub info: Option<String>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Render items as indented tree using recursive DFS.
/// Descends only into folders in `expanded`.
pub fn flatten_tree(items: &[Item], expanded: &HashSet<ItemId>) -> Vec<TreeRow> {
    fn collect(items: &[Item], depth: usize, expanded: &HashSet<ItemId>, result: &mut Vec<TreeRow>) {
        for item in items {
            let is_expanded = expanded.contains(&item.id);
            result.push(TreeRow {
                id: item.id,
                kind: item.kind,
                name: item.name.clone(),
                info: item.display_info().map(str::to_string),
                depth,
                has_children: !item.children.is_empty(),
                expanded: is_expanded,
            });
            if is_expanded {
                collect(&item.children, depth + 1, expanded, result);
            }
        }
    }

    let mut result = Vec::new();
    collect(items, 0, expanded, &mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Item> {
        vec![
            Item::url(1, "zebra", "https://z.example"),
            Item::folder(2, "Work").with_children(vec![
                Item::folder(3, "Projects").with_children(vec![Item::url(4, "Repo", "https://r.example")]),
                Item::url(5, "Mail", "https://m.example"),
            ]),
            Item::folder(6, "archive"),
        ]
    }

    fn loaded() -> TreeStore {
        let mut store = TreeStore::new();
        store.replace_children(None, sample(), ChildOrder::Collated).unwrap();
        store
    }

    #[test]
    fn test_snapshot_builds_arena() {
        let store = loaded();
        assert_eq!(store.len(), 6);
        assert_eq!(store.parent_of(4), Some(3));
        assert_eq!(store.parent_of(2), None);
        assert_eq!(store.child_ids(Some(2)), &[3, 5]);
        assert!(store.is_descendant_of(4, 2));
        assert!(!store.is_descendant_of(2, 4));
    }

    #[test]
    fn test_children_are_collated() {
        let store = loaded();
        let names: Vec<&str> = store.get_children(None).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "Work", "zebra"]);
    }

    #[test]
    fn test_backend_order_is_kept() {
        let mut store = TreeStore::new();
        store.replace_children(None, sample(), ChildOrder::Backend).unwrap();
        let ids: Vec<ItemId> = store.get_children(None).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 6]);
    }

    #[test]
    fn test_collation_ties_keep_order_and_use_pinyin() {
        let mut items = vec![
            Item::url(1, "same", "https://a"),
            Item::url(2, "Same", "https://b"),
            Item::url(3, "北京", "https://c"),
            Item::url(4, "Apple", "https://d"),
            Item::folder(5, "zzz"),
        ];
        sort_items(&mut items);
        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        // "北京" sorts as "beijing"
        assert_eq!(ids, vec![5, 4, 3, 1, 2]);
    }

    #[test]
    fn test_replace_subtree_drops_missing_items() {
        let mut store = loaded();
        let dropped = store
            .replace_children(Some(2), vec![Item::url(5, "Mail", "https://m.example")], ChildOrder::Collated)
            .unwrap();
        let mut dropped = dropped;
        dropped.sort();
        assert_eq!(dropped, vec![3, 4]);
        assert!(!store.contains(4));
        assert_eq!(store.child_ids(Some(2)), &[5]);
    }

    #[test]
    fn test_item_moved_in_snapshot_leaves_old_parent() {
        let mut store = loaded();
        store
            .replace_children(Some(6), vec![Item::url(5, "Mail", "https://m.example")], ChildOrder::Collated)
            .unwrap();
        assert_eq!(store.parent_of(5), Some(6));
        assert_eq!(store.child_ids(Some(2)), &[3]);
    }

    #[test]
    fn test_invalid_snapshots_are_rejected_untouched() {
        let mut store = loaded();
        assert_eq!(
            store.replace_children(Some(99), vec![], ChildOrder::Collated),
            Err(TreeError::UnknownFolder(99))
        );
        assert_eq!(
            store.replace_children(Some(1), vec![], ChildOrder::Collated),
            Err(TreeError::NotAFolder(1))
        );
        assert_eq!(
            store.replace_children(None, vec![Item::folder(7, "a"), Item::folder(7, "b")], ChildOrder::Collated),
            Err(TreeError::DuplicateId(7))
        );
        let bad = Item::url(8, "u", "https://u").with_children(vec![Item::folder(9, "f")]);
        assert_eq!(
            store.replace_children(None, vec![bad], ChildOrder::Collated),
            Err(TreeError::UrlWithChildren(8))
        );
        assert_eq!(
            store.replace_children(Some(3), vec![Item::folder(2, "Work")], ChildOrder::Collated),
            Err(TreeError::Cycle(2))
        );
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_flatten_tree() {
        let mut items = sample();
        sort_items(&mut items);
        let expanded: HashSet<ItemId> = [2, 3].into_iter().collect();

        let rows = flatten_tree(&items, &expanded);

        // archive(0), Work(0), Projects(1), Repo(2), Mail(1), zebra(0)
        let shape: Vec<(ItemId, usize)> = rows.iter().map(|r| (r.id, r.depth)).collect();
        assert_eq!(shape, vec![(6, 0), (2, 0), (3, 1), (4, 2), (5, 1), (1, 0)]);
        assert!(rows[1].has_children);
        assert!(!rows[0].has_children);
    }

    #[test]
    fn test_flatten_skips_collapsed() {
        let rows = flatten_tree(&sample(), &HashSet::new());
        assert_eq!(rows.len(), 3);
    }
}
