//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. Navigation
//! keys come in two flavours: arrows, and the WASD cluster for one-hand use.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    Undo,
    Redo,
    Delete,
    Duplicate,
    Copy,
    Cut,
    Paste,

    // ── Navigation ──
    In,
    Out,
    Next,
    Previous,
    /// Remember the cursor position as the marker.
    Mark,
    /// Connect the block at the cursor to the marked connection.
    InsertAtMark,
    /// Pull the block at the cursor off its parent.
    Disconnect,

    // ── UI ──
    /// Abort the current drag, or clear the selection.
    Cancel,
}

/// Resolves key events into shortcut actions.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Delete"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.command();

        // ── Modifier combos first (most specific) ──
        if cmd && modifiers.shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                _ => None,
            };
        }

        if modifiers.shift || modifiers.alt {
            return None;
        }

        // ── Single keys (no modifiers) ──
        match key {
            "ArrowRight" | "d" | "D" => Some(ShortcutAction::In),
            "ArrowLeft" | "a" | "A" => Some(ShortcutAction::Out),
            "ArrowDown" | "s" | "S" => Some(ShortcutAction::Next),
            "ArrowUp" | "w" | "W" => Some(ShortcutAction::Previous),
            "Enter" => Some(ShortcutAction::Mark),
            "i" | "I" => Some(ShortcutAction::InsertAtMark),
            "x" | "X" => Some(ShortcutAction::Disconnect),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Cancel),
            _ => None,
        }
    }
}
