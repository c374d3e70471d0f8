use crate::theme::Theme;
use serde::{Deserialize, Serialize};

/// Per-workspace configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceOptions {
    /// Undo stack cap; oldest events fall off first.
    pub max_undo: usize,
    /// Radius within which a dragged connection snaps.
    pub snap_radius: f64,
    /// Radius used while a candidate connection is already highlighted.
    pub connecting_snap_radius: f64,
    /// Bias (in workspace units) toward keeping the current candidate.
    pub current_connection_preference: f64,
    /// Pointer travel before a click becomes a drag.
    pub drag_radius: f64,
    /// Maximum simultaneous gestures across all pointers.
    pub max_gestures: usize,
    /// Bumped blocks are offset this far from the connection they left.
    pub bump_offset: f64,
    pub theme: Theme,
    pub read_only: bool,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            max_undo: 1024,
            snap_radius: 28.0,
            connecting_snap_radius: 48.0,
            current_connection_preference: 8.0,
            drag_radius: 5.0,
            max_gestures: 10,
            bump_offset: 28.0,
            theme: Theme::classic(),
            read_only: false,
        }
    }
}

impl WorkspaceOptions {
    /// Load from JSON; omitted keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
