pub mod block;
pub mod blocks;
pub mod checker;
pub mod colour;
mod connect;
pub mod connection;
pub mod coordinate;
pub mod dom;
pub mod dom_parser;
pub mod error;
pub mod events;
pub mod field;
pub mod history;
pub mod id;
pub mod options;
pub mod registry;
pub mod theme;
pub mod variables;
pub mod workspace;
pub mod xml;

pub use block::{Align, Block, BlockFlags, Input, InputKind};
pub use blocks::stock_registry;
pub use connection::{Connection, ConnectionKind, ConnectionRef, ConnectionSlot};
pub use coordinate::Coordinate;
pub use dom::XmlElement;
pub use error::*;
pub use events::{ChangeElement, Event, EventKind, Location};
pub use field::{Field, FieldKind};
pub use history::ListenerId;
pub use id::{BlockId, GroupId, Name, VariableId, WorkspaceId};
pub use options::WorkspaceOptions;
pub use registry::{BlockDef, BlockDefinition, BlockRegistry};
pub use theme::{BlockStyle, ResolvedStyle, Theme};
pub use variables::{VariableMap, VariableModel};
pub use workspace::{Link, Workspace};
