use crate::input::PointerId;
use brick_core::error::{BlockError, ConnectionError, XmlError};
use brick_core::id::BlockId;
use brick_render::RenderError;

/// Errors raised by the editor layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("pointer {0} already has a gesture in progress")]
    GestureInProgress(PointerId),

    #[error("too many simultaneous gestures (limit {0})")]
    TooManyGestures(usize),

    #[error("no gesture for pointer {0}")]
    NoGesture(PointerId),

    #[error("the workspace is read-only")]
    ReadOnly,

    #[error("block {0} cannot be moved")]
    NotMovable(BlockId),

    #[error("clipboard is empty")]
    EmptyClipboard,

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
