//! In-memory Backend
//!
//! Reference `ItemBackend` holding the tree in process. Used by tests and
//! demos in place of the server.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BackendError, BackendResult, ItemBackend};
use crate::models::{Item, ItemId, ItemKind};
use crate::moves::MoveOperation;

#[derive(Debug, Default)]
struct Records {
    /// Items without children
    items: HashMap<ItemId, Item>,
    parents: HashMap<ItemId, Option<ItemId>>,
    /// Children per folder in backend order (None = root)
    children: HashMap<Option<ItemId>, Vec<ItemId>>,
    applied: HashSet<Uuid>,
    failures: VecDeque<BackendError>,
    move_calls: usize,
}

impl Records {
    fn insert(&mut self, parent: Option<ItemId>, mut item: Item) {
        let children = std::mem::take(&mut item.children);
        self.parents.insert(item.id, parent);
        self.children.entry(parent).or_default().push(item.id);
        let id = item.id;
        self.items.insert(id, item);
        for child in children {
            self.insert(Some(id), child);
        }
    }

    fn build(&self, parent: Option<ItemId>) -> Vec<Item> {
        self.children
            .get(&parent)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.items.get(id))
                    .map(|item| {
                        let mut item = item.clone();
                        if item.is_folder() {
                            item.children = self.build(Some(item.id));
                        }
                        item
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_below(&self, folder: ItemId, ancestor: ItemId) -> bool {
        let mut current = Some(folder);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parents.get(&id).copied().flatten();
        }
        false
    }

    fn check(&self, op: &MoveOperation) -> BackendResult<()> {
        let folder = self
            .items
            .get(&op.into_folder_id)
            .ok_or_else(|| BackendError::Rejected(format!("Folder {} not found", op.into_folder_id)))?;
        if folder.kind != ItemKind::Folder {
            return Err(BackendError::Rejected(format!("Item {} is not a folder", folder.id)));
        }
        for id in &op.ids {
            if !self.items.contains_key(id) {
                return Err(BackendError::Rejected(format!("Item {} not found", id)));
            }
            if self.is_below(op.into_folder_id, *id) {
                return Err(BackendError::Rejected(format!(
                    "Folder {} is inside item {}",
                    op.into_folder_id, id
                )));
            }
        }
        Ok(())
    }

    fn reparent(&mut self, id: ItemId, into: ItemId) {
        let old = self.parents.get(&id).copied().flatten();
        if let Some(siblings) = self.children.get_mut(&old) {
            siblings.retain(|c| *c != id);
        }
        self.children.entry(Some(into)).or_default().push(id);
        self.parents.insert(id, Some(into));
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Records>,
}

impl MemoryBackend {
    pub fn new(roots: Vec<Item>) -> Self {
        let mut records = Records::default();
        for item in roots {
            records.insert(None, item);
        }
        Self {
            records: Mutex::new(records),
        }
    }

    /// Make the next move call fail with `error` without applying anything
    pub async fn fail_next(&self, error: BackendError) {
        self.records.lock().await.failures.push_back(error);
    }

    /// Number of `move_items` calls received, failed ones included
    pub async fn move_calls(&self) -> usize {
        self.records.lock().await.move_calls
    }

    pub async fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.records.lock().await.parents.get(&id).copied().flatten()
    }
}

#[async_trait(?Send)]
impl ItemBackend for MemoryBackend {
    async fn move_items(&self, op: &MoveOperation) -> BackendResult<()> {
        let mut records = self.records.lock().await;
        records.move_calls += 1;
        if let Some(error) = records.failures.pop_front() {
            return Err(error);
        }
        if records.applied.contains(&op.op_id) {
            log::debug!("[MOVE] {} already applied", op.op_id);
            return Ok(());
        }
        records.check(op)?;
        for id in &op.ids {
            records.reparent(*id, op.into_folder_id);
        }
        records.applied.insert(op.op_id);
        Ok(())
    }

    async fn list_children(&self, folder: Option<ItemId>) -> BackendResult<Vec<Item>> {
        let records = self.records.lock().await;
        if let Some(id) = folder {
            if !records.items.contains_key(&id) {
                return Err(BackendError::Rejected(format!("Folder {} not found", id)));
            }
        }
        Ok(records.build(folder))
    }
}
