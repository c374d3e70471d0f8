use brick_core::error::{BlockError, ColourError};
use brick_core::id::BlockId;

/// Errors raised while measuring, drawing, or colouring blocks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Colour(#[from] ColourError),

    /// A connected child had no size when its parent was measured.
    #[error("block {0} was measured before its child {1}")]
    ChildNotRendered(BlockId, BlockId),
}
