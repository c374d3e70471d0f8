pub mod clipboard;
pub mod cursor;
pub mod dragger;
pub mod error;
pub mod gesture;
pub mod input;
pub mod navigator;
pub mod node;
pub mod session;
pub mod shortcuts;

pub use clipboard::Clipboard;
pub use cursor::{Cursor, Marker, MarkerListener};
pub use dragger::{BlockDragger, Candidate, DropOutcome};
pub use error::EditorError;
pub use gesture::{Gesture, GestureHandler, GestureKind, GestureState};
pub use input::{InputEvent, Modifiers, PointerId};
pub use navigator::{Navigator, Policy};
pub use node::{Node, NodeKind};
pub use session::EditorSession;
pub use shortcuts::{ShortcutAction, ShortcutMap};
