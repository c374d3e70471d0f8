//! Typed connection points owned by blocks.
//!
//! A `Connection` is pure data: kind, optional type-check list, optional
//! shadow template, and its offset inside the owning block. Who it is
//! attached to is *not* stored here. The workspace arena keeps one edge
//! per attached pair, so both sides of a link always agree.

use crate::coordinate::Coordinate;
use crate::dom::XmlElement;
use crate::id::{BlockId, Name};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// The four connection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Socket of a value input (right-facing, on the parent).
    InputValue,
    /// Plug on the left edge of an expression block.
    OutputValue,
    /// Bottom of a statement block, or the mouth of a statement input.
    NextStatement,
    /// Top of a statement block.
    PreviousStatement,
}

impl ConnectionKind {
    /// The only kind this one may attach to.
    pub const fn opposite(self) -> ConnectionKind {
        match self {
            Self::InputValue => Self::OutputValue,
            Self::OutputValue => Self::InputValue,
            Self::NextStatement => Self::PreviousStatement,
            Self::PreviousStatement => Self::NextStatement,
        }
    }

    /// True if this side belongs to the parent block of a link.
    pub const fn is_superior(self) -> bool {
        matches!(self, Self::InputValue | Self::NextStatement)
    }
}

/// Where on a block a connection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionSlot {
    Previous,
    Next,
    Output,
    Input(Name),
}

impl ConnectionSlot {
    /// Parent-side slots (next and inputs) point down the tree.
    pub const fn is_superior(self) -> bool {
        matches!(self, Self::Next | Self::Input(_))
    }
}

impl fmt::Display for ConnectionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => f.write_str("previous"),
            Self::Next => f.write_str("next"),
            Self::Output => f.write_str("output"),
            Self::Input(name) => write!(f, "input:{name}"),
        }
    }
}

/// Address of one connection: owning block plus slot.
///
/// This is the only "pointer" to a connection anyone holds; it is resolved
/// through the workspace arena on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub block: BlockId,
    pub slot: ConnectionSlot,
}

impl ConnectionRef {
    pub const fn new(block: BlockId, slot: ConnectionSlot) -> Self {
        Self { block, slot }
    }

    pub const fn previous(block: BlockId) -> Self {
        Self::new(block, ConnectionSlot::Previous)
    }

    pub const fn next(block: BlockId) -> Self {
        Self::new(block, ConnectionSlot::Next)
    }

    pub const fn output(block: BlockId) -> Self {
        Self::new(block, ConnectionSlot::Output)
    }

    pub fn input(block: BlockId, name: &str) -> Self {
        Self::new(block, ConnectionSlot::Input(Name::intern(name)))
    }
}

impl fmt::Display for ConnectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block, self.slot)
    }
}

/// Type-check list. `None` or an empty list accepts anything.
pub type Check = SmallVec<[String; 2]>;

/// A connection point on a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub check: Option<Check>,
    /// Serialized `<shadow>` template respawned whenever the slot empties.
    pub shadow: Option<XmlElement>,
    /// Offset from the owning block's origin, written by the renderer.
    pub offset: Coordinate,
}

impl Connection {
    pub fn new(kind: ConnectionKind) -> Self {
        Self {
            kind,
            check: None,
            shadow: None,
            offset: Coordinate::ZERO,
        }
    }

    pub fn with_check<I, S>(mut self, check: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_check(check);
        self
    }

    /// Replace the type-check list. An empty iterator clears it.
    pub fn set_check<I, S>(&mut self, check: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Check = check.into_iter().map(Into::into).collect();
        self.check = if list.is_empty() { None } else { Some(list) };
    }

    /// True if the two type-check lists intersect, or either is absent.
    pub fn checks_intersect(&self, other: &Connection) -> bool {
        match (&self.check, &other.check) {
            (Some(a), Some(b)) => a.iter().any(|t| b.contains(t)),
            _ => true,
        }
    }
}
