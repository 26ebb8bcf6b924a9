//! Drag Transfer Format
//!
//! What one drag puts on the platform's data transfer, and the preview image
//! description shown under the pointer while dragging.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{count, truncate, Item, ItemId, ItemKind};

/// JSON list of dragged ids
pub const IDS_KEY: &str = "application/json";
/// Plain url of a single dragged bookmark, so dropping on a tab strip opens it
pub const URI_LIST_KEY: &str = "text/uri-list";
/// Items are moved, but "copy" shows the more helpful cursor
pub const EFFECT_ALLOWED: &str = "copy";

const PREVIEW_NAME_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    MissingIds,
    Malformed(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::MissingIds => write!(f, "Drop carries no item ids"),
            TransferError::Malformed(msg) => write!(f, "Malformed drop data: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

/// Payload captured when a drag starts; immutable for that drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragData {
    pub ids: Vec<ItemId>,
    pub uri: Option<String>,
    pub preview_text: String,
    /// Value for the transfer's `effectAllowed`
    pub effect_allowed: &'static str,
}

impl DragData {
    /// `ids` is the resolved payload; `dragged` is the item under the pointer
    pub fn new(ids: Vec<ItemId>, dragged: &Item) -> Self {
        let uri = match (ids.as_slice(), dragged.kind) {
            ([only], ItemKind::Url) if *only == dragged.id => dragged.url.clone(),
            _ => None,
        };
        let preview_text = preview_text(ids.len(), &dragged.name);
        Self {
            ids,
            uri,
            preview_text,
            effect_allowed: EFFECT_ALLOWED,
        }
    }

    /// Key/value pairs to set on the data transfer
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![(IDS_KEY, encode_ids(&self.ids))];
        if let Some(uri) = &self.uri {
            entries.push((URI_LIST_KEY, uri.clone()));
        }
        entries
    }
}

pub fn encode_ids(ids: &[ItemId]) -> String {
    serde_json::Value::from(ids.to_vec()).to_string()
}

pub fn decode_ids(json: &str) -> Result<Vec<ItemId>, TransferError> {
    serde_json::from_str(json).map_err(|e| TransferError::Malformed(e.to_string()))
}

/// Read the dragged ids back from a data transfer lookup
pub fn ids_from_transfer(get: impl Fn(&str) -> Option<String>) -> Result<Vec<ItemId>, TransferError> {
    let json = get(IDS_KEY).filter(|s| !s.is_empty()).ok_or(TransferError::MissingIds)?;
    decode_ids(&json)
}

/// `Name` (truncated) for one item, `[N items]` for several
pub fn preview_text(n: usize, name: &str) -> String {
    if n == 1 {
        truncate(name, PREVIEW_NAME_CHARS)
    } else {
        format!("[{}]", count("item", n))
    }
}

// ========================
// Drag preview
// ========================

/// Style values read from the rendered tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewMetrics {
    /// CSS height of one item row
    pub row_height: f64,
    /// Device-pixel width of the preview canvas
    pub width: f64,
    pub font_family: String,
    pub background: String,
    pub foreground: String,
}

impl Default for PreviewMetrics {
    fn default() -> Self {
        Self {
            row_height: 40.0,
            width: 360.0,
            font_family: "sans-serif".to_string(),
            background: "#ffffff".to_string(),
            foreground: "#000000".to_string(),
        }
    }
}

/// Everything needed to paint the drag image. Rendered at 2x to avoid blur;
/// the CSS size is half the canvas size.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub text: String,
    pub width: f64,
    pub height: f64,
    pub css_width: f64,
    pub css_height: f64,
    pub font: String,
    pub background: String,
    pub foreground: String,
    pub text_x: f64,
    pub text_y: f64,
    pub max_text_width: f64,
    /// Pointer offset inside the image
    pub offset: (f64, f64),
}

pub fn build_drag_preview(text: &str, metrics: &PreviewMetrics) -> DragPreview {
    let width = metrics.width;
    let height = metrics.row_height * 2.0;
    DragPreview {
        text: text.to_string(),
        width,
        height,
        css_width: width / 2.0,
        css_height: height / 2.0,
        font: format!("{}px {}", height / 2.0, metrics.font_family),
        background: metrics.background.clone(),
        foreground: metrics.foreground.clone(),
        text_x: 10.0,
        text_y: height / 1.5,
        max_text_width: width - 20.0,
        offset: (0.0, height),
    }
}
