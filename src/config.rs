//! Engine Configuration
//!
//! Tunables for gestures, dragging, ordering and the drag preview. Loaded from
//! JSON; every field is optional.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gesture::GestureConfig;
use crate::transfer::PreviewMetrics;
use crate::tree::ChildOrder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Touch hold before a press counts as a long press (clamped to >= 500)
    pub long_press_ms: u64,
    /// Pointer travel before a press becomes a drag
    pub drag_threshold_px: f64,
    /// Ordering of folder children read from the store
    pub child_order: ChildOrder,
    pub preview: PreviewMetrics,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 500,
            drag_threshold_px: tree_dragdrop::DRAG_THRESHOLD_PX,
            child_order: ChildOrder::Collated,
            preview: PreviewMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn gesture(&self) -> GestureConfig {
        GestureConfig::with_long_press(Duration::from_millis(self.long_press_ms))
    }
}
