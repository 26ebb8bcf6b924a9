//! Move Engine
//!
//! Validation, confirmation and the optimistic two-phase apply of "move these
//! items into that folder". Shared by drag-and-drop and cut/paste.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookmarks::Bookmarks;
use crate::commands::BackendError;
use crate::models::{count, ItemId, ItemKind, ItemPatch};

/// A validated move, shown to the user before anything changes
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub ids: Vec<ItemId>,
    pub into_folder_id: ItemId,
    pub folder_name: String,
}

impl MoveRequest {
    pub fn prompt(&self) -> String {
        format!("Move {} into \"{}\"?", count("item", self.ids.len()), self.folder_name)
    }
}

/// User confirmation gate. Declining makes the move a no-op.
pub trait ConfirmMove {
    fn confirm(&self, request: &MoveRequest) -> bool;
}

impl<F> ConfirmMove for F
where
    F: Fn(&MoveRequest) -> bool,
{
    fn confirm(&self, request: &MoveRequest) -> bool {
        self(request)
    }
}

/// Wire form of a move sent to the backend. `op_id` makes retries idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOperation {
    pub op_id: Uuid,
    pub ids: Vec<ItemId>,
    pub into_folder_id: ItemId,
}

/// A move whose optimistic patches are applied and whose backend call has
/// not settled yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub operation: MoveOperation,
    /// Parent override of each item before this move
    prior_parents: Vec<(ItemId, Option<ItemId>)>,
    /// Folders (None = root) whose children change with this move
    pub affected: BTreeSet<Option<ItemId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub op_id: Uuid,
    pub moved: Vec<ItemId>,
    pub into_folder_id: ItemId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveError {
    Empty,
    UnknownItem(ItemId),
    NotAFolder(ItemId),
    IntoSelf(ItemId),
    /// `folder` sits below `ancestor`, one of the moved items
    IntoDescendant { folder: ItemId, ancestor: ItemId },
    /// Item already belongs to a move that has not settled
    InFlight(ItemId),
    Declined,
    Backend(BackendError),
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::Empty => write!(f, "Nothing to move"),
            MoveError::UnknownItem(id) => write!(f, "Item {} not found", id),
            MoveError::NotAFolder(id) => write!(f, "Item {} is not a folder", id),
            MoveError::IntoSelf(id) => write!(f, "Cannot move folder {} into itself", id),
            MoveError::IntoDescendant { folder, ancestor } => write!(
                f,
                "Cannot move folder {} into its own descendant {}",
                ancestor, folder
            ),
            MoveError::InFlight(id) => write!(f, "Item {} is already being moved", id),
            MoveError::Declined => write!(f, "Move cancelled"),
            MoveError::Backend(e) => write!(f, "Move failed: {}", e),
        }
    }
}

impl std::error::Error for MoveError {}

impl From<BackendError> for MoveError {
    fn from(e: BackendError) -> Self {
        MoveError::Backend(e)
    }
}

impl MoveError {
    /// Validation failures the user never needs to hear about
    pub fn is_silent(&self) -> bool {
        matches!(self, MoveError::Empty | MoveError::Declined)
    }
}

impl Bookmarks {
    /// First of `ids` found on the way up from `folder`, following both the
    /// stored parent and any pending move target of every node.
    pub(crate) fn reaching_ancestor(&self, folder: ItemId, ids: &[ItemId]) -> Option<ItemId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([folder]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if current != folder && ids.contains(&current) {
                return Some(current);
            }
            queue.extend(self.tree.parent_of(current));
            queue.extend(self.overlay.parent_override(current));
        }
        None
    }

    pub fn is_in_flight(&self, id: ItemId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn validate_move(&self, ids: &[ItemId], into_folder_id: ItemId) -> Result<MoveRequest, MoveError> {
        let ids: Vec<ItemId> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Err(MoveError::Empty);
        }
        if ids.contains(&into_folder_id) {
            return Err(MoveError::IntoSelf(into_folder_id));
        }
        let folder = self.item(into_folder_id).ok_or(MoveError::UnknownItem(into_folder_id))?;
        if folder.kind != ItemKind::Folder {
            return Err(MoveError::NotAFolder(into_folder_id));
        }
        for &id in &ids {
            if !self.is_displayed(id) {
                return Err(MoveError::UnknownItem(id));
            }
            if self.is_in_flight(id) {
                return Err(MoveError::InFlight(id));
            }
        }
        if let Some(ancestor) = self.reaching_ancestor(into_folder_id, &ids) {
            return Err(MoveError::IntoDescendant {
                folder: into_folder_id,
                ancestor,
            });
        }
        Ok(MoveRequest {
            ids,
            into_folder_id,
            folder_name: folder.name,
        })
    }

    /// Validate, ask for confirmation and apply the optimistic patches.
    /// The returned move must be settled with [`Bookmarks::settle_move`].
    pub fn begin_move(
        &mut self,
        ids: &[ItemId],
        into_folder_id: ItemId,
        confirm: &dyn ConfirmMove,
    ) -> Result<PendingMove, MoveError> {
        let request = self.validate_move(ids, into_folder_id)?;
        if !confirm.confirm(&request) {
            log::debug!("[MOVE] Declined: {}", request.prompt());
            return Err(MoveError::Declined);
        }
        self.apply_move(&request)
    }

    /// Apply the optimistic patches of a confirmed request. The request is
    /// validated again since the tree may have changed while the user was
    /// deciding.
    pub fn apply_move(&mut self, request: &MoveRequest) -> Result<PendingMove, MoveError> {
        let request = self.validate_move(&request.ids, request.into_folder_id)?;
        let into_folder_id = request.into_folder_id;
        let op_id = Uuid::new_v4();
        let mut affected = BTreeSet::from([Some(into_folder_id)]);
        let mut prior_parents = Vec::with_capacity(request.ids.len());
        for &id in &request.ids {
            affected.insert(self.overlay.effective_parent(&self.tree, id));
            prior_parents.push((id, self.overlay.parent_override(id)));
            self.overlay.apply(id, ItemPatch::parent(into_folder_id));
            self.in_flight.insert(id, op_id);
        }
        log::info!(
            "[MOVE] {} {:?} -> folder {}",
            op_id,
            request.ids,
            into_folder_id
        );

        Ok(PendingMove {
            operation: MoveOperation {
                op_id,
                ids: request.ids,
                into_folder_id,
            },
            prior_parents,
            affected,
        })
    }

    /// Finish a move with the backend's answer: drop the parent overrides on
    /// success, put them back on failure.
    pub fn settle_move(
        &mut self,
        pending: PendingMove,
        result: Result<(), BackendError>,
    ) -> Result<MoveReport, MoveError> {
        let PendingMove {
            operation,
            prior_parents,
            ..
        } = pending;
        for id in &operation.ids {
            if self.in_flight.get(id) == Some(&operation.op_id) {
                self.in_flight.remove(id);
            }
        }

        match result {
            Ok(()) => {
                for id in &operation.ids {
                    if self.overlay.parent_override(*id) == Some(operation.into_folder_id) {
                        self.overlay.restore_parent(*id, None);
                    }
                }
                self.selection.unmark_cut(&operation.ids);
                log::info!("[MOVE] {} settled", operation.op_id);
                Ok(MoveReport {
                    op_id: operation.op_id,
                    moved: operation.ids,
                    into_folder_id: operation.into_folder_id,
                })
            }
            Err(e) => {
                for (id, prior) in prior_parents {
                    self.overlay.restore_parent(id, prior);
                }
                log::warn!("[MOVE] {} rolled back: {}", operation.op_id, e);
                Err(MoveError::Backend(e))
            }
        }
    }
}
