//! Error types for block-model operations.
//!
//! Every fallible operation in the core returns one of these. Callers that
//! want "try it and fall back" semantics (drag release, clipboard paste)
//! match on the error instead of the core swallowing it.

use crate::connection::{ConnectionRef, ConnectionKind};
use crate::id::{BlockId, Name, VariableId};

/// Why two connections cannot be joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompatibleReason {
    /// Both connections belong to the same block.
    SelfConnection,
    /// The kinds are not structural opposites (e.g. previous ↔ previous).
    WrongType,
    /// A connection reference did not resolve to a live connection.
    TargetNull,
    /// The type-check lists do not intersect.
    ChecksFailed,
    /// A shadow block may only have shadow children.
    ShadowParent,
    /// The parent side already descends from the child side.
    Circular,
}

impl std::fmt::Display for IncompatibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::SelfConnection => "attempt to connect a block to itself",
            Self::WrongType => "connection kinds are not opposite",
            Self::TargetNull => "target connection does not exist",
            Self::ChecksFailed => "connection type checks do not intersect",
            Self::ShadowParent => "shadow blocks may only have shadow children",
            Self::Circular => "connection would create a cycle",
        };
        f.write_str(text)
    }
}

/// Errors raised by `connect`, `disconnect`, and connection lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    #[error("cannot connect {a} ({a_kind:?}) to {b} ({b_kind:?}): {reason}")]
    Incompatible {
        a: ConnectionRef,
        a_kind: Option<ConnectionKind>,
        b: ConnectionRef,
        b_kind: Option<ConnectionKind>,
        reason: IncompatibleReason,
    },

    #[error("connection {0} does not exist")]
    UnknownConnection(ConnectionRef),
}

/// Errors raised by block construction and mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("block {0} does not exist")]
    UnknownBlock(BlockId),

    #[error("Connected blocks cannot be deleted (block {0})")]
    ConnectedBlockDelete(BlockId),

    #[error("block {block} already has an input named '{name}'")]
    DuplicateInput { block: BlockId, name: Name },

    #[error("block {block} has no input named '{name}'")]
    UnknownInput { block: BlockId, name: Name },

    #[error("block {block} has no field named '{name}'")]
    UnknownField { block: BlockId, name: Name },

    #[error("invalid value '{value}' for field '{name}'")]
    InvalidFieldValue { name: Name, value: String },

    #[error("block {0} cannot have both an output and a previous/next connection")]
    ShapeConflict(BlockId),

    #[error("block {0} is not deletable")]
    NotDeletable(BlockId),

    #[error("block {0} is not a top-level block")]
    NotTopLevel(BlockId),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors raised by the block-definition registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown block type '{block_type}' (block id {block_id:?})")]
    UnknownType {
        block_type: String,
        block_id: Option<BlockId>,
    },

    #[error("block type '{0}' is already registered")]
    DuplicateType(String),

    #[error("invalid block definition JSON: {0}")]
    InvalidDefinition(String),
}

/// Errors raised by the variable map.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariableError {
    #[error("variable '{name}' already exists with type '{existing_type}'")]
    NameConflict { name: String, existing_type: String },

    #[error("variable id {0} is already in use")]
    DuplicateId(VariableId),

    #[error("variable {0} does not exist")]
    UnknownVariable(VariableId),
}

/// Errors raised while reading or writing the persisted XML format.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XmlError {
    #[error("XML parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error(
        "<{element}> in block {} is missing required attribute '{attribute}'",
        owner_label(.block_id)
    )]
    MissingAttribute {
        element: String,
        attribute: &'static str,
        /// The block being read, when its XML carries an id.
        block_id: Option<BlockId>,
    },

    #[error("unexpected element <{found}>, expected <{expected}>")]
    UnexpectedElement { found: String, expected: &'static str },

    #[error("failed to load block {block_id:?} of type '{block_type}': {source}")]
    Block {
        block_id: Option<BlockId>,
        block_type: String,
        #[source]
        source: BlockError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Variable(#[from] VariableError),
}

fn owner_label(id: &Option<BlockId>) -> String {
    id.map_or_else(|| "<no id>".to_string(), |id| id.to_string())
}

/// Errors raised when replaying events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    #[error("event belongs to workspace {event} but was run against {workspace}")]
    WrongWorkspace { event: String, workspace: String },

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("invalid event JSON: {0}")]
    Json(String),
}

/// A colour string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColourError {
    #[error("invalid colour: '{0}'")]
    InvalidColour(String),
}

impl From<ConnectionError> for EventError {
    fn from(err: ConnectionError) -> Self {
        EventError::Block(BlockError::Connection(err))
    }
}

impl From<ConnectionError> for XmlError {
    fn from(err: ConnectionError) -> Self {
        XmlError::Block {
            block_id: None,
            block_type: String::new(),
            source: BlockError::Connection(err),
        }
    }
}
