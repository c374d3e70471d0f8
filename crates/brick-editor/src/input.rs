//! Input abstraction layer.
//!
//! Normalizes mouse, touch, and pen events into a unified `InputEvent`
//! consumed by the gesture handler and shortcut map. Coordinates are in
//! workspace units; the host applies scroll and zoom before handing
//! events over.

use brick_core::coordinate::Coordinate;
use std::fmt;

/// Identifies one pointer: the mouse, or one finger or pen contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u32);

impl PointerId {
    pub const MOUSE: PointerId = PointerId(0);
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Keyboard modifier state at the time of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// ⌘ on macOS, Ctrl elsewhere.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A normalized input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        pointer: PointerId,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    PointerMove {
        pointer: PointerId,
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    PointerUp {
        pointer: PointerId,
        x: f64,
        y: f64,
    },
    /// The platform took the pointer away (touch cancel, lost capture).
    PointerCancel { pointer: PointerId },
    Key {
        /// `KeyboardEvent.key` value, e.g. `"z"`, `"ArrowDown"`.
        key: String,
        modifiers: Modifiers,
    },
}

impl InputEvent {
    pub fn mouse_down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            pointer: PointerId::MOUSE,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn mouse_move(x: f64, y: f64) -> Self {
        Self::PointerMove {
            pointer: PointerId::MOUSE,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn mouse_up(x: f64, y: f64) -> Self {
        Self::PointerUp {
            pointer: PointerId::MOUSE,
            x,
            y,
        }
    }

    pub fn key(key: &str) -> Self {
        Self::Key {
            key: key.to_string(),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key_with(key: &str, modifiers: Modifiers) -> Self {
        Self::Key {
            key: key.to_string(),
            modifiers,
        }
    }

    /// Extract position if this is a positioned pointer event.
    pub fn position(&self) -> Option<Coordinate> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. } => Some(Coordinate::new(*x, *y)),
            _ => None,
        }
    }

    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            Self::PointerDown { pointer, .. }
            | Self::PointerMove { pointer, .. }
            | Self::PointerUp { pointer, .. }
            | Self::PointerCancel { pointer } => Some(*pointer),
            Self::Key { .. } => None,
        }
    }
}
