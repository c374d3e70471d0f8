//! Block-definition registry.
//!
//! Definitions are looked up by type name when a block is created or
//! deserialized. The registry is an ordinary value: build one, register
//! definitions, and hand it to each workspace that should know them.
//! Nothing is process-global.
//!
//! Definitions come in two flavours: Rust types implementing
//! [`BlockDefinition`] (needed for mutators), and declarative
//! [`BlockDef`] values deserialized from the JSON block format.

use crate::block::{Align, Block, InputKind};
use crate::connection::Check;
use crate::dom::XmlElement;
use crate::error::{BlockError, RegistryError};
use crate::field::{DropdownOption, Field, FieldKind};
use serde::{Deserialize, Deserializer};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Capability set for one block type.
pub trait BlockDefinition {
    /// Build inputs, fields, and connections on a freshly created block.
    fn init(&self, block: &mut Block) -> Result<(), BlockError>;

    /// Serialize mutation state. `None` means nothing to persist.
    fn mutation_to_dom(&self, _block: &Block) -> Option<XmlElement> {
        None
    }

    /// Restore mutation state, reshaping the block's inputs as needed.
    fn dom_to_mutation(&self, _block: &mut Block, _xml: &XmlElement) -> Result<(), BlockError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct BlockRegistry {
    definitions: HashMap<String, Rc<dyn BlockDefinition>>,
    /// Sorted type names, rebuilt lazily after any register/unregister.
    sorted_types: OnceCell<Vec<String>>,
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<D: BlockDefinition + 'static>(
        &mut self,
        block_type: &str,
        definition: D,
    ) -> Result<(), RegistryError> {
        if self.definitions.contains_key(block_type) {
            return Err(RegistryError::DuplicateType(block_type.to_string()));
        }
        self.definitions
            .insert(block_type.to_string(), Rc::new(definition));
        self.sorted_types = OnceCell::new();
        Ok(())
    }

    /// Register every definition in a JSON array. Returns how many.
    pub fn register_json(&mut self, json: &str) -> Result<usize, RegistryError> {
        let defs: Vec<BlockDef> = serde_json::from_str(json)
            .map_err(|e| RegistryError::InvalidDefinition(e.to_string()))?;
        let count = defs.len();
        for def in defs {
            def.validate()?;
            let block_type = def.block_type.clone();
            self.register(&block_type, def)?;
        }
        Ok(count)
    }

    pub fn unregister(&mut self, block_type: &str) -> bool {
        let removed = self.definitions.remove(block_type).is_some();
        if removed {
            self.sorted_types = OnceCell::new();
        }
        removed
    }

    pub fn get(&self, block_type: &str) -> Option<Rc<dyn BlockDefinition>> {
        self.definitions.get(block_type).cloned()
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.definitions.contains_key(block_type)
    }

    /// All registered type names, sorted.
    pub fn types(&self) -> &[String] {
        self.sorted_types.get_or_init(|| {
            let mut types: Vec<String> = self.definitions.keys().cloned().collect();
            types.sort();
            types
        })
    }
}

// ─── Declarative definitions ────────────────────────────────────────────

/// A check given as one type name or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CheckSpec {
    One(String),
    Many(Vec<String>),
}

impl CheckSpec {
    pub fn to_check(&self) -> Check {
        match self {
            Self::One(s) => std::iter::once(s.clone()).collect(),
            Self::Many(v) => v.iter().cloned().collect(),
        }
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null`
/// (`Some(None)`): `"output": null` means "has an output, any type".
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColourSpec {
    Hue(f64),
    Literal(String),
}

/// One `%N` argument of a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgDef {
    InputValue {
        name: String,
        #[serde(default)]
        check: Option<CheckSpec>,
        #[serde(default)]
        align: Align,
    },
    InputStatement {
        name: String,
        #[serde(default)]
        check: Option<CheckSpec>,
        #[serde(default)]
        align: Align,
    },
    InputDummy {
        #[serde(default)]
        name: String,
        #[serde(default)]
        align: Align,
    },
    FieldLabel {
        #[serde(default)]
        text: String,
    },
    FieldInput {
        name: String,
        #[serde(default)]
        text: String,
    },
    FieldNumber {
        name: String,
        #[serde(default)]
        value: f64,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        precision: Option<f64>,
    },
    FieldDropdown {
        name: String,
        options: Vec<DropdownOption>,
    },
    FieldCheckbox {
        name: String,
        #[serde(default)]
        checked: bool,
    },
    FieldColour {
        name: String,
        #[serde(default = "default_colour")]
        colour: String,
    },
    FieldVariable {
        name: String,
        #[serde(default = "default_variable")]
        variable: String,
        #[serde(default, rename = "defaultType")]
        default_type: String,
    },
    FieldAngle {
        name: String,
        #[serde(default)]
        angle: f64,
    },
    FieldImage {
        src: String,
        width: f64,
        height: f64,
        #[serde(default)]
        alt: String,
    },
}

fn default_colour() -> String {
    "#ff0000".to_string()
}

fn default_variable() -> String {
    "item".to_string()
}

impl ArgDef {
    fn input_kind(&self) -> Option<(InputKind, &str, Option<&CheckSpec>, Align)> {
        match self {
            Self::InputValue { name, check, align } => Some((InputKind::Value, name, check.as_ref(), *align)),
            Self::InputStatement { name, check, align } => {
                Some((InputKind::Statement, name, check.as_ref(), *align))
            }
            Self::InputDummy { name, align } => Some((InputKind::Dummy, name, None, *align)),
            _ => None,
        }
    }

    fn to_field(&self) -> Option<Field> {
        let field = match self {
            Self::FieldLabel { text } => Field::label(text.clone()),
            Self::FieldInput { name, text } => Field::text_input(name, text.clone()),
            Self::FieldNumber {
                name,
                value,
                min,
                max,
                precision,
            } => Field::new(
                Some(name),
                FieldKind::Number {
                    value: *value,
                    min: *min,
                    max: *max,
                    precision: *precision,
                },
            ),
            Self::FieldDropdown { name, options } => Field::dropdown(name, options.clone()),
            Self::FieldCheckbox { name, checked } => Field::checkbox(name, *checked),
            Self::FieldColour { name, colour } => Field::new(Some(name), FieldKind::Colour { colour: colour.clone() }),
            Self::FieldVariable {
                name,
                variable,
                default_type,
            } => Field::new(
                Some(name),
                FieldKind::Variable {
                    variable: None,
                    default_name: variable.clone(),
                    variable_type: default_type.clone(),
                },
            ),
            Self::FieldAngle { name, angle } => Field::new(Some(name), FieldKind::Angle { degrees: *angle }),
            Self::FieldImage {
                src,
                width,
                height,
                alt,
            } => Field::new(
                None,
                FieldKind::Image {
                    src: src.clone(),
                    width: *width,
                    height: *height,
                    alt: alt.clone(),
                },
            ),
            _ => return None,
        };
        Some(field)
    }
}

/// A block type in the JSON block format.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDef {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub message0: String,
    #[serde(default)]
    pub args0: Vec<ArgDef>,
    #[serde(default)]
    pub message1: Option<String>,
    #[serde(default)]
    pub args1: Vec<ArgDef>,
    #[serde(default)]
    pub message2: Option<String>,
    #[serde(default)]
    pub args2: Vec<ArgDef>,
    #[serde(default, deserialize_with = "present")]
    pub output: Option<Option<CheckSpec>>,
    #[serde(default, deserialize_with = "present")]
    pub previous_statement: Option<Option<CheckSpec>>,
    #[serde(default, deserialize_with = "present")]
    pub next_statement: Option<Option<CheckSpec>>,
    #[serde(default)]
    pub inputs_inline: Option<bool>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub colour: Option<ColourSpec>,
    #[serde(default)]
    pub tooltip: String,
    #[serde(default)]
    pub hat: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Text(String),
    Arg(usize),
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(Token::Text(text.to_string()));
    }
}

/// Split `"if %1 then %2"` into text and 1-based argument references.
/// `%%` is a literal percent sign.
fn tokenize(message: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = message.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 0 {
                push_text(&mut tokens, &message[start..i]);
                let n = message[i + 1..i + 1 + digits].parse().unwrap_or(0);
                tokens.push(Token::Arg(n));
                i += 1 + digits;
                start = i;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'%') {
                push_text(&mut tokens, &message[start..=i]);
                i += 2;
                start = i;
                continue;
            }
        }
        i += 1;
    }
    push_text(&mut tokens, &message[start..]);
    tokens
}

impl BlockDef {
    fn messages(&self) -> Vec<(&str, &[ArgDef])> {
        let mut out = vec![(self.message0.as_str(), self.args0.as_slice())];
        if let Some(m) = &self.message1 {
            out.push((m.as_str(), self.args1.as_slice()));
        }
        if let Some(m) = &self.message2 {
            out.push((m.as_str(), self.args2.as_slice()));
        }
        out
    }

    /// Every `%N` must name an argument and every argument must be used once.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |msg: String| RegistryError::InvalidDefinition(format!("{}: {msg}", self.block_type));
        if self.output.is_some() && (self.previous_statement.is_some() || self.next_statement.is_some()) {
            return Err(invalid("output cannot be combined with previous/next".into()));
        }
        for (message, args) in self.messages() {
            let mut used = vec![false; args.len()];
            for token in tokenize(message) {
                if let Token::Arg(n) = token {
                    if n == 0 || n > args.len() {
                        return Err(invalid(format!("message index %{n} out of range")));
                    }
                    if used[n - 1] {
                        return Err(invalid(format!("message index %{n} used twice")));
                    }
                    used[n - 1] = true;
                }
            }
            if let Some(unused) = used.iter().position(|u| !u) {
                return Err(invalid(format!("argument %{} is never referenced", unused + 1)));
            }
        }
        Ok(())
    }

    fn interpolate(block: &mut Block, message: &str, args: &[ArgDef]) -> Result<(), BlockError> {
        let mut pending: Vec<Field> = Vec::new();
        for token in tokenize(message) {
            match token {
                Token::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        pending.push(Field::label(text));
                    }
                }
                Token::Arg(n) => {
                    let Some(arg) = args.get(n.wrapping_sub(1)) else {
                        continue;
                    };
                    if let Some((kind, name, check, align)) = arg.input_kind() {
                        let input = block.append_input(kind, name)?;
                        input.set_align(align);
                        if let Some(check) = check {
                            input.set_check(check.to_check());
                        }
                        input.fields.append(&mut pending);
                    } else if let Some(field) = arg.to_field() {
                        pending.push(field);
                    }
                }
            }
        }
        if !pending.is_empty() {
            let input = block.append_input(InputKind::Dummy, "")?;
            input.fields.append(&mut pending);
        }
        Ok(())
    }
}

impl BlockDefinition for BlockDef {
    fn init(&self, block: &mut Block) -> Result<(), BlockError> {
        for (message, args) in self.messages() {
            Self::interpolate(block, message, args)?;
        }
        if let Some(check) = &self.output {
            block.set_output(true, check.as_ref().map(CheckSpec::to_check))?;
        }
        if let Some(check) = &self.previous_statement {
            block.set_previous_statement(true, check.as_ref().map(CheckSpec::to_check))?;
        }
        if let Some(check) = &self.next_statement {
            block.set_next_statement(true, check.as_ref().map(CheckSpec::to_check))?;
        }
        block.inputs_inline = self.inputs_inline;
        block.style = match (&self.style, &self.colour) {
            (Some(style), _) => style.clone(),
            (None, Some(ColourSpec::Hue(h))) => h.to_string(),
            (None, Some(ColourSpec::Literal(c))) => c.clone(),
            (None, None) => String::new(),
        };
        block.tooltip = self.tooltip.clone();
        block.hat = self.hat.as_deref() == Some("cap");
        Ok(())
    }
}
