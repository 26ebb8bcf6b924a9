//! Bookmark Models
//!
//! Data structures matching the backend's item snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use tree_dragdrop::Point;

/// Stable item identifier assigned by the backend
pub type ItemId = u32;

/// Item type determines behavior and appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Holds an ordered list of children; the only kind that accepts drops
    Folder,
    /// A bookmark
    Url,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::Url => "url",
        }
    }

    /// Human-readable name used in prompts and menus
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::Url => "bookmark",
        }
    }

    pub fn accepts_drop(&self) -> bool {
        matches!(self, ItemKind::Folder)
    }
}

impl FromStr for ItemKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(ItemKind::Folder),
            "url" => Ok(ItemKind::Url),
            other => Err(ModelError::UnknownItemType(other.to_string())),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownItemType(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownItemType(t) => write!(f, "unknown item type \"{}\"", t),
        }
    }
}

impl std::error::Error for ModelError {}

/// A folder or bookmark, with its children when it is a folder.
///
/// This is the shape of backend snapshots and of the composed view handed to
/// renderers. The tree store keeps its own flat copy keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Secondary display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Item>,
}

impl Item {
    pub fn folder(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            kind: ItemKind::Folder,
            name: name.into(),
            url: None,
            info: None,
            children: Vec::new(),
        }
    }

    pub fn url(id: ItemId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            kind: ItemKind::Url,
            name: name.into(),
            url: Some(url.into()),
            info: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Item>) -> Self {
        self.children = children;
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// Secondary line: `info`, falling back to the url
    pub fn display_info(&self) -> Option<&str> {
        self.info.as_deref().or(self.url.as_deref())
    }

    /// Link target used when the platform handles a modified click itself
    pub fn href(&self) -> String {
        match (&self.kind, &self.url) {
            (ItemKind::Url, Some(url)) => url.clone(),
            _ => format!("/#/folders/{}", self.id),
        }
    }
}

/// Partial field update recorded in the change overlay.
///
/// `None` means "field not patched". A patch never carries an id; composing
/// a patch onto an item keeps the item's id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Folder the item is shown in while a move is pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
}

impl ItemPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn parent(parent_id: ItemId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.info.is_none() && self.parent_id.is_none()
    }

    /// Merge a later patch in; fields it sets override ours
    pub fn merge(&mut self, later: ItemPatch) {
        if later.name.is_some() {
            self.name = later.name;
        }
        if later.url.is_some() {
            self.url = later.url;
        }
        if later.info.is_some() {
            self.info = later.info;
        }
        if later.parent_id.is_some() {
            self.parent_id = later.parent_id;
        }
    }
}

/// `1 item`, `3 items`
pub fn count(noun: &str, n: usize) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Shorten to `max` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
