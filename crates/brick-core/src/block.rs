//! Block, Input, and their structural mutators.
//!
//! A `Block` owns its inputs, fields, and connections outright. It holds no
//! pointer to its workspace, parent, or children: those relationships live
//! in the workspace arena and are looked up by id.

use crate::connection::{Check, Connection, ConnectionKind, ConnectionSlot};
use crate::coordinate::Coordinate;
use crate::error::BlockError;
use crate::field::Field;
use crate::id::{BlockId, Name};
use serde::{Deserialize, Serialize};

/// The three input shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Fields only, no connection.
    Dummy,
    /// Expression socket.
    Value,
    /// Statement mouth (C-shaped).
    Statement,
}

impl InputKind {
    /// Connection kind carried by an input of this shape.
    pub const fn connection_kind(self) -> Option<ConnectionKind> {
        match self {
            Self::Dummy => None,
            Self::Value => Some(ConnectionKind::InputValue),
            Self::Statement => Some(ConnectionKind::NextStatement),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Align {
    #[default]
    Left,
    Centre,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub name: Name,
    pub kind: InputKind,
    pub connection: Option<Connection>,
    pub align: Align,
    pub fields: Vec<Field>,
    pub visible: bool,
}

impl Input {
    pub fn new(kind: InputKind, name: &str) -> Self {
        Self {
            name: Name::intern(name),
            kind,
            connection: kind.connection_kind().map(Connection::new),
            align: Align::Left,
            fields: Vec::new(),
            visible: true,
        }
    }

    pub fn append_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn set_check<I, S>(&mut self, check: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(conn) = &mut self.connection {
            conn.set_check(check);
        }
        self
    }

    pub fn set_align(&mut self, align: Align) -> &mut Self {
        self.align = align;
        self
    }
}

/// Boolean state flags. `disabled` here is the block's own flag; use
/// `Workspace::is_inherited_disabled` for the effective state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFlags {
    pub collapsed: bool,
    pub disabled: bool,
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
}

impl Default for BlockFlags {
    fn default() -> Self {
        Self {
            collapsed: false,
            disabled: false,
            deletable: true,
            movable: true,
            editable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub block_type: String,
    pub inputs: Vec<Input>,
    pub previous: Option<Connection>,
    pub next: Option<Connection>,
    pub output: Option<Connection>,
    pub flags: BlockFlags,
    /// `None` defers to the definition's default (external inputs).
    pub inputs_inline: Option<bool>,
    /// What the definition set; only a differing value is persisted.
    pub inputs_inline_default: Option<bool>,
    pub is_shadow: bool,
    /// Workspace-space origin. Authoritative for top-level blocks; the
    /// renderer derives it for connected children.
    pub xy: Coordinate,
    /// Style name looked up in the theme, or a literal colour.
    pub style: String,
    pub tooltip: String,
    pub comment: Option<String>,
    /// Draw a start hat (only for blocks without previous/output).
    pub hat: bool,
}

impl Block {
    pub fn new(id: BlockId, block_type: impl Into<String>) -> Self {
        Self {
            id,
            block_type: block_type.into(),
            inputs: Vec::new(),
            previous: None,
            next: None,
            output: None,
            flags: BlockFlags::default(),
            inputs_inline: None,
            inputs_inline_default: None,
            is_shadow: false,
            xy: Coordinate::ZERO,
            style: String::new(),
            tooltip: String::new(),
            comment: None,
            hat: false,
        }
    }

    // ─── Structural mutators (construction and mutation only) ────────────

    /// Append an input. Names must be unique except for unnamed dummies.
    pub fn append_input(&mut self, kind: InputKind, name: &str) -> Result<&mut Input, BlockError> {
        if !name.is_empty() && self.input(name).is_some() {
            return Err(BlockError::DuplicateInput {
                block: self.id,
                name: Name::intern(name),
            });
        }
        self.inputs.push(Input::new(kind, name));
        let last = self.inputs.len() - 1;
        Ok(&mut self.inputs[last])
    }

    /// Append a field to the named input's field row.
    pub fn append_field(&mut self, field: Field, input_name: &str) -> Result<(), BlockError> {
        let id = self.id;
        let input = self
            .input_mut(input_name)
            .ok_or_else(|| BlockError::UnknownInput {
                block: id,
                name: Name::intern(input_name),
            })?;
        input.fields.push(field);
        Ok(())
    }

    /// Remove an input. The caller must already have detached any child.
    pub fn remove_input(&mut self, name: &str) -> Result<Input, BlockError> {
        let pos = self
            .inputs
            .iter()
            .position(|i| i.name.as_str() == name)
            .ok_or_else(|| BlockError::UnknownInput {
                block: self.id,
                name: Name::intern(name),
            })?;
        Ok(self.inputs.remove(pos))
    }

    pub fn set_previous_statement(&mut self, enabled: bool, check: Option<Check>) -> Result<(), BlockError> {
        if enabled && self.output.is_some() {
            return Err(BlockError::ShapeConflict(self.id));
        }
        self.previous = enabled.then(|| {
            let mut c = Connection::new(ConnectionKind::PreviousStatement);
            c.check = check.filter(|c| !c.is_empty());
            c
        });
        Ok(())
    }

    pub fn set_next_statement(&mut self, enabled: bool, check: Option<Check>) -> Result<(), BlockError> {
        if enabled && self.output.is_some() {
            return Err(BlockError::ShapeConflict(self.id));
        }
        self.next = enabled.then(|| {
            let mut c = Connection::new(ConnectionKind::NextStatement);
            c.check = check.filter(|c| !c.is_empty());
            c
        });
        Ok(())
    }

    pub fn set_output(&mut self, enabled: bool, check: Option<Check>) -> Result<(), BlockError> {
        if enabled && (self.previous.is_some() || self.next.is_some()) {
            return Err(BlockError::ShapeConflict(self.id));
        }
        self.output = enabled.then(|| {
            let mut c = Connection::new(ConnectionKind::OutputValue);
            c.check = check.filter(|c| !c.is_empty());
            c
        });
        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name.as_str() == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.name.as_str() == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.inputs.iter().flat_map(|i| i.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()
            .find(|f| f.name.is_some_and(|n| n.as_str() == name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.inputs
            .iter_mut()
            .flat_map(|i| i.fields.iter_mut())
            .find(|f| f.name.is_some_and(|n| n.as_str() == name))
    }

    pub fn field_value(&self, name: &str) -> Option<String> {
        self.field(name).map(Field::value)
    }

    pub fn connection(&self, slot: ConnectionSlot) -> Option<&Connection> {
        match slot {
            ConnectionSlot::Previous => self.previous.as_ref(),
            ConnectionSlot::Next => self.next.as_ref(),
            ConnectionSlot::Output => self.output.as_ref(),
            ConnectionSlot::Input(name) => self
                .inputs
                .iter()
                .find(|i| i.name == name)
                .and_then(|i| i.connection.as_ref()),
        }
    }

    pub fn connection_mut(&mut self, slot: ConnectionSlot) -> Option<&mut Connection> {
        match slot {
            ConnectionSlot::Previous => self.previous.as_mut(),
            ConnectionSlot::Next => self.next.as_mut(),
            ConnectionSlot::Output => self.output.as_mut(),
            ConnectionSlot::Input(name) => self
                .inputs
                .iter_mut()
                .find(|i| i.name == name)
                .and_then(|i| i.connection.as_mut()),
        }
    }

    /// Every connection slot present, in a stable order: output, previous,
    /// inputs in order, next.
    pub fn slots(&self) -> Vec<ConnectionSlot> {
        let mut slots = Vec::with_capacity(self.inputs.len() + 2);
        if self.output.is_some() {
            slots.push(ConnectionSlot::Output);
        }
        if self.previous.is_some() {
            slots.push(ConnectionSlot::Previous);
        }
        for input in &self.inputs {
            if input.connection.is_some() {
                slots.push(ConnectionSlot::Input(input.name));
            }
        }
        if self.next.is_some() {
            slots.push(ConnectionSlot::Next);
        }
        slots
    }

    /// The slot this block hangs from when it has a parent.
    pub fn parent_facing_slot(&self) -> Option<ConnectionSlot> {
        if self.output.is_some() {
            Some(ConnectionSlot::Output)
        } else if self.previous.is_some() {
            Some(ConnectionSlot::Previous)
        } else {
            None
        }
    }

    /// The single value input, if the block has exactly one.
    pub fn only_value_input(&self) -> Option<&Input> {
        let mut values = self.inputs.iter().filter(|i| i.kind == InputKind::Value);
        let first = values.next()?;
        values.next().is_none().then_some(first)
    }

    pub fn is_inline(&self) -> bool {
        self.inputs_inline.unwrap_or(false)
    }

    pub fn is_collapsed(&self) -> bool {
        self.flags.collapsed
    }

    pub fn is_deletable(&self) -> bool {
        self.flags.deletable && !self.is_shadow
    }

    pub fn is_movable(&self) -> bool {
        self.flags.movable && !self.is_shadow
    }
}
