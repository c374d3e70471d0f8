//! Block fields: labels, editable values, and images.
//!
//! Field kinds are a closed tagged union resolved at construction time.
//! Every kind exposes its value as a string (the persisted form) and
//! validates incoming values in `set_value`.

use crate::colour;
use crate::error::BlockError;
use crate::id::{Name, VariableId};
use serde::{Deserialize, Serialize};

/// One entry of a dropdown: human text plus the persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DropdownOption {
    pub text: String,
    pub value: String,
}

impl From<(String, String)> for DropdownOption {
    fn from((text, value): (String, String)) -> Self {
        Self { text, value }
    }
}

impl From<DropdownOption> for (String, String) {
    fn from(opt: DropdownOption) -> Self {
        (opt.text, opt.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Label {
        text: String,
    },
    TextInput {
        text: String,
    },
    Number {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
        precision: Option<f64>,
    },
    Dropdown {
        options: Vec<DropdownOption>,
        selected: String,
    },
    Checkbox {
        checked: bool,
    },
    Colour {
        colour: String,
    },
    /// References a variable by id; the display name lives in the
    /// workspace's variable map.
    Variable {
        variable: Option<VariableId>,
        default_name: String,
        variable_type: String,
    },
    Angle {
        degrees: f64,
    },
    Image {
        src: String,
        width: f64,
        height: f64,
        alt: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Unnamed fields (most labels) are never serialized.
    pub name: Option<Name>,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: Option<&str>, kind: FieldKind) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()).map(Name::intern),
            kind,
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(None, FieldKind::Label { text: text.into() })
    }

    pub fn text_input(name: &str, text: impl Into<String>) -> Self {
        Self::new(Some(name), FieldKind::TextInput { text: text.into() })
    }

    pub fn number(name: &str, value: f64) -> Self {
        Self::new(
            Some(name),
            FieldKind::Number {
                value,
                min: None,
                max: None,
                precision: None,
            },
        )
    }

    pub fn dropdown(name: &str, options: Vec<DropdownOption>) -> Self {
        let selected = options.first().map(|o| o.value.clone()).unwrap_or_default();
        Self::new(Some(name), FieldKind::Dropdown { options, selected })
    }

    pub fn checkbox(name: &str, checked: bool) -> Self {
        Self::new(Some(name), FieldKind::Checkbox { checked })
    }

    pub fn variable(name: &str, default_name: impl Into<String>) -> Self {
        Self::new(
            Some(name),
            FieldKind::Variable {
                variable: None,
                default_name: default_name.into(),
                variable_type: String::new(),
            },
        )
    }

    /// Editable fields are persisted; labels and images are structure.
    pub fn is_serializable(&self) -> bool {
        self.name.is_some()
            && !matches!(self.kind, FieldKind::Label { .. } | FieldKind::Image { .. })
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self.kind, FieldKind::Label { .. } | FieldKind::Image { .. })
    }

    /// The persisted value.
    pub fn value(&self) -> String {
        match &self.kind {
            FieldKind::Label { text } | FieldKind::TextInput { text } => text.clone(),
            FieldKind::Number { value, .. } => format_number(*value),
            FieldKind::Dropdown { selected, .. } => selected.clone(),
            FieldKind::Checkbox { checked } => if *checked { "TRUE" } else { "FALSE" }.to_string(),
            FieldKind::Colour { colour } => colour.clone(),
            FieldKind::Variable { variable, .. } => {
                variable.map(|v| v.as_str().to_string()).unwrap_or_default()
            }
            FieldKind::Angle { degrees } => format_number(*degrees),
            FieldKind::Image { src, .. } => src.clone(),
        }
    }

    /// Display text. Variable fields need the variable map and return
    /// their default name here.
    pub fn text(&self) -> String {
        match &self.kind {
            FieldKind::Dropdown { options, selected } => options
                .iter()
                .find(|o| &o.value == selected)
                .map(|o| o.text.clone())
                .unwrap_or_else(|| selected.clone()),
            FieldKind::Variable { default_name, .. } => default_name.clone(),
            FieldKind::Checkbox { checked } => if *checked { "\u{2713}" } else { " " }.to_string(),
            FieldKind::Image { alt, .. } => alt.clone(),
            _ => self.value(),
        }
    }

    /// Validate and store a new value.
    pub fn set_value(&mut self, value: &str) -> Result<(), BlockError> {
        let name = self.name.unwrap_or_else(|| Name::intern(""));
        let invalid = || BlockError::InvalidFieldValue {
            name,
            value: value.to_string(),
        };
        match &mut self.kind {
            FieldKind::Label { text } | FieldKind::TextInput { text } => {
                *text = value.to_string();
            }
            FieldKind::Number {
                value: v,
                min,
                max,
                precision,
            } => {
                let mut n = parse_number(value).ok_or_else(invalid)?;
                if let Some(p) = precision.filter(|p| *p > 0.0) {
                    n = (n / p).round() * p;
                }
                if let Some(lo) = *min {
                    n = n.max(lo);
                }
                if let Some(hi) = *max {
                    n = n.min(hi);
                }
                *v = n;
            }
            FieldKind::Dropdown { options, selected } => {
                if !options.iter().any(|o| o.value == value) {
                    return Err(invalid());
                }
                *selected = value.to_string();
            }
            FieldKind::Checkbox { checked } => {
                *checked = match value.to_ascii_uppercase().as_str() {
                    "TRUE" => true,
                    "FALSE" => false,
                    _ => return Err(invalid()),
                };
            }
            FieldKind::Colour { colour } => {
                *colour = colour::parse(value).map_err(|_| invalid())?;
            }
            FieldKind::Variable { variable, .. } => {
                if value.is_empty() {
                    return Err(invalid());
                }
                *variable = Some(VariableId::intern(value));
            }
            FieldKind::Angle { degrees } => {
                let n = parse_number(value).ok_or_else(invalid)?;
                *degrees = n.rem_euclid(360.0);
            }
            FieldKind::Image { src, .. } => {
                *src = value.to_string();
            }
        }
        Ok(())
    }

    pub fn variable_id(&self) -> Option<VariableId> {
        match &self.kind {
            FieldKind::Variable { variable, .. } => *variable,
            _ => None,
        }
    }
}

/// Accepts plain decimals plus the spellings users type: `1e3`, `Infinity`.
fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim().replace(',', "");
    match t.as_str() {
        "Infinity" | "inf" => Some(f64::INFINITY),
        "-Infinity" | "-inf" => Some(f64::NEG_INFINITY),
        _ => t.parse::<f64>().ok().filter(|n| !n.is_nan()),
    }
}

/// Integers print without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
