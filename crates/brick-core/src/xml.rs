//! Reading and writing the persisted XML format.
//!
//! ```xml
//! <xml xmlns="https://developers.google.com/blockly/xml">
//!   <variables><variable type="" id="v1">count</variable></variables>
//!   <block type="controls_if" id="a" x="10" y="20">
//!     <mutation else="1"></mutation>
//!     <value name="IF0"><block type="logic_boolean"><field name="BOOL">TRUE</field></block></value>
//!     <next><block type="text_print"/></next>
//!   </block>
//! </xml>
//! ```
//!
//! Loading is all-or-nothing: blocks are built with events suppressed, and
//! either every top-level block loads (one create event each, in one
//! group) or everything created so far is removed and the error returned.

use crate::block::{Block, InputKind};
use crate::connection::{ConnectionRef, ConnectionSlot};
use crate::coordinate::Coordinate;
use crate::dom::XmlElement;
use crate::dom_parser::parse_xml;
use crate::error::{BlockError, ConnectionError, XmlError};
use crate::events::EventKind;
use crate::field::FieldKind;
use crate::id::{BlockId, VariableId};
use crate::variables::VariableModel;
use crate::workspace::Workspace;
use std::collections::HashSet;

pub const XML_NAMESPACE: &str = "https://developers.google.com/blockly/xml";

// ─── Text helpers ────────────────────────────────────────────────────────

/// Parse text whose root element must be `<xml>`.
pub fn text_to_dom(text: &str) -> Result<XmlElement, XmlError> {
    let root = parse_xml(text)?;
    if root.name != "xml" {
        return Err(XmlError::UnexpectedElement {
            found: root.name,
            expected: "xml",
        });
    }
    Ok(root)
}

pub fn dom_to_text(dom: &XmlElement) -> String {
    dom.to_xml_string()
}

pub fn dom_to_pretty_text(dom: &XmlElement) -> String {
    dom.to_pretty_string()
}

// ─── Workspace → DOM ─────────────────────────────────────────────────────

pub fn workspace_to_dom(ws: &Workspace, no_id: bool) -> Result<XmlElement, BlockError> {
    let mut xml = XmlElement::new("xml").with_attr("xmlns", XML_NAMESPACE);
    let variables = ws.variables().all();
    if !variables.is_empty() {
        xml.push_child(variables_to_dom(variables));
    }
    for id in ws.top_blocks(true) {
        xml.push_child(block_to_dom_with_xy(ws, id, no_id)?);
    }
    Ok(xml)
}

pub fn variables_to_dom(variables: &[VariableModel]) -> XmlElement {
    let mut out = XmlElement::new("variables");
    for var in variables {
        out.push_child(
            XmlElement::new("variable")
                .with_attr("type", &var.var_type)
                .with_attr("id", var.id)
                .with_text(var.name.clone()),
        );
    }
    out
}

/// [`block_to_dom`] plus the block's workspace coordinates.
pub fn block_to_dom_with_xy(ws: &Workspace, id: BlockId, no_id: bool) -> Result<XmlElement, BlockError> {
    let mut element = block_to_dom(ws, id, no_id)?;
    let xy = ws.require(id)?.xy;
    // `+ 0.0` folds negative zero.
    element.set_attr("x", xy.x.round() + 0.0);
    element.set_attr("y", xy.y.round() + 0.0);
    Ok(element)
}

/// Serialize a block and everything below it.
pub fn block_to_dom(ws: &Workspace, id: BlockId, no_id: bool) -> Result<XmlElement, BlockError> {
    let block = ws.require(id)?;
    let mut element = XmlElement::new(if block.is_shadow { "shadow" } else { "block" })
        .with_attr("type", &block.block_type);
    if !no_id {
        element.set_attr("id", block.id);
    }

    if let Some(definition) = ws.registry().get(&block.block_type)
        && let Some(mutation) = definition.mutation_to_dom(block)
    {
        element.push_child(mutation);
    }

    for field in block.fields().filter(|f| f.is_serializable()) {
        element.push_child(field_to_dom(ws, field));
    }

    if let Some(comment) = &block.comment {
        element.push_child(XmlElement::new("comment").with_text(comment.clone()));
    }

    for input in &block.inputs {
        let tag = match input.kind {
            InputKind::Dummy => continue,
            InputKind::Value => "value",
            InputKind::Statement => "statement",
        };
        let container = XmlElement::new(tag).with_attr("name", input.name);
        if let Some(container) = connection_to_dom(
            ws,
            ConnectionRef::new(id, ConnectionSlot::Input(input.name)),
            container,
            no_id,
        )? {
            element.push_child(container);
        }
    }

    if let Some(inline) = block.inputs_inline
        && block.inputs_inline != block.inputs_inline_default
    {
        element.set_attr("inline", inline);
    }
    if block.flags.collapsed {
        element.set_attr("collapsed", true);
    }
    if block.flags.disabled {
        element.set_attr("disabled", true);
    }
    if !block.flags.deletable && !block.is_shadow {
        element.set_attr("deletable", false);
    }
    if !block.flags.movable && !block.is_shadow {
        element.set_attr("movable", false);
    }
    if !block.flags.editable {
        element.set_attr("editable", false);
    }

    if block.next.is_some()
        && let Some(next) = connection_to_dom(
            ws,
            ConnectionRef::next(id),
            XmlElement::new("next"),
            no_id,
        )?
    {
        element.push_child(next);
    }

    Ok(element)
}

fn field_to_dom(ws: &Workspace, field: &crate::field::Field) -> XmlElement {
    let name = field.name.map(|n| n.as_str()).unwrap_or_default();
    let element = XmlElement::new("field").with_attr("name", name);
    match &field.kind {
        FieldKind::Variable {
            variable: Some(var),
            variable_type,
            ..
        } => {
            let (text, var_type) = match ws.variable(*var) {
                Some(model) => (model.name.clone(), model.var_type.clone()),
                None => (String::new(), variable_type.clone()),
            };
            element
                .with_attr("id", var)
                .with_attr("variabletype", var_type)
                .with_text(text)
        }
        _ => element.with_text(field.value()),
    }
}

/// Fill `container` with the shadow template and/or attached block.
/// `None` when there is nothing to write.
fn connection_to_dom(
    ws: &Workspace,
    conn: ConnectionRef,
    mut container: XmlElement,
    no_id: bool,
) -> Result<Option<XmlElement>, BlockError> {
    let child = ws.target_block(conn);
    let child_is_shadow = child.and_then(|c| ws.block(c)).is_some_and(|b| b.is_shadow);
    if let Some(shadow) = ws.connection(conn).and_then(|c| c.shadow.as_ref())
        && !child_is_shadow
    {
        container.push_child(clone_shadow(shadow, no_id));
    }
    if let Some(child) = child {
        container.push_child(block_to_dom(ws, child, no_id)?);
    }
    Ok((!container.children.is_empty()).then_some(container))
}

fn clone_shadow(shadow: &XmlElement, no_id: bool) -> XmlElement {
    let mut copy = shadow.clone();
    if no_id {
        strip_ids(&mut copy);
    }
    copy
}

fn strip_ids(element: &mut XmlElement) {
    if matches!(element.name.as_str(), "block" | "shadow") {
        element.remove_attr("id");
    }
    for child in element.children.iter_mut() {
        if let crate::dom::XmlNode::Element(child) = child {
            strip_ids(child);
        }
    }
}

// ─── DOM → Workspace ─────────────────────────────────────────────────────

/// Load every block and variable in an `<xml>` element. Returns the new
/// top-level block ids in document order.
pub fn dom_to_workspace(xml: &XmlElement, ws: &mut Workspace) -> Result<Vec<BlockId>, XmlError> {
    if xml.name != "xml" {
        return Err(XmlError::UnexpectedElement {
            found: xml.name.clone(),
            expected: "xml",
        });
    }
    let known_vars: HashSet<VariableId> = ws.variables().all().iter().map(|v| v.id).collect();
    let mut created: Vec<BlockId> = Vec::new();

    ws.disable_events();
    let result = (|| -> Result<(), XmlError> {
        for child in xml.elements() {
            match child.name.as_str() {
                "variables" => dom_to_variables(child, ws)?,
                "block" | "shadow" => {
                    let id = dom_to_block_headless(child, ws)?;
                    created.push(id);
                    let x = coordinate_attr(child, "x");
                    let y = coordinate_attr(child, "y");
                    let current = ws.require(id).map_err(|e| block_error(child, e))?.xy;
                    ws.translate_subtree(id, Coordinate::new(x, y) - current);
                }
                other => log::warn!("ignoring unexpected element <{other}> in workspace XML"),
            }
        }
        Ok(())
    })();
    ws.enable_events();

    match result {
        Ok(()) => {
            announce_load(ws, &known_vars, &created)?;
            Ok(created)
        }
        Err(err) => {
            rollback(ws, &known_vars, &created);
            Err(err)
        }
    }
}

/// Load a single `<block>` or `<shadow>` element.
pub fn dom_to_block(xml: &XmlElement, ws: &mut Workspace) -> Result<BlockId, XmlError> {
    let known_vars: HashSet<VariableId> = ws.variables().all().iter().map(|v| v.id).collect();
    ws.disable_events();
    let result = dom_to_block_headless(xml, ws);
    ws.enable_events();
    match result {
        Ok(id) => {
            announce_load(ws, &known_vars, &[id])?;
            Ok(id)
        }
        Err(err) => {
            rollback(ws, &known_vars, &[]);
            Err(err)
        }
    }
}

fn new_variables(ws: &Workspace, known_vars: &HashSet<VariableId>) -> Vec<VariableModel> {
    ws.variables()
        .all()
        .iter()
        .filter(|v| !known_vars.contains(&v.id))
        .cloned()
        .collect()
}

fn rollback(ws: &mut Workspace, known_vars: &HashSet<VariableId>, created: &[BlockId]) {
    log::debug!("load failed, rolling back {} block(s)", created.len());
    for id in created {
        ws.remove_subtree(*id);
    }
    for var in new_variables(ws, known_vars) {
        if let Err(err) = ws.variables_mut().delete(var.id) {
            log::warn!("rollback could not remove variable {}: {err}", var.id);
        }
    }
}

/// Fire variable and block create events for a finished load, as one group.
fn announce_load(
    ws: &mut Workspace,
    known_vars: &HashSet<VariableId>,
    created: &[BlockId],
) -> Result<(), XmlError> {
    let opened = ws.begin_group();
    let result = (|| -> Result<(), XmlError> {
        for var in new_variables(ws, known_vars) {
            ws.fire(EventKind::VarCreate {
                var_id: var.id,
                var_type: var.var_type,
                var_name: var.name,
            });
        }
        for id in created {
            let snapshot = block_to_dom_with_xy(ws, *id, false).map_err(|source| XmlError::Block {
                block_id: Some(*id),
                block_type: String::new(),
                source,
            })?;
            let ids = ws.descendant_ids(*id);
            ws.fire(EventKind::Create {
                block_id: *id,
                xml: snapshot,
                ids,
            });
        }
        Ok(())
    })();
    ws.end_group(opened);
    result
}

fn dom_to_variables(xml: &XmlElement, ws: &mut Workspace) -> Result<(), XmlError> {
    for var in xml.elements().filter(|e| e.name == "variable") {
        let var_type = var.attr("type").unwrap_or_default();
        let id = var.attr("id").map(VariableId::intern);
        ws.create_variable(&var.text(), var_type, id)?;
    }
    Ok(())
}

fn coordinate_attr(xml: &XmlElement, name: &str) -> f64 {
    match xml.attr(name) {
        None => 0.0,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring non-numeric {name}=\"{raw}\" on <{}>", xml.name);
            0.0
        }),
    }
}

fn block_error(xml: &XmlElement, source: BlockError) -> XmlError {
    XmlError::Block {
        block_id: xml.attr("id").map(BlockId::intern),
        block_type: xml.attr("type").unwrap_or_default().to_string(),
        source,
    }
}

fn bool_attr(xml: &XmlElement, name: &str) -> Option<bool> {
    xml.attr(name).map(|v| v == "true")
}

/// Build a block tree with events suppressed by the caller. On failure the
/// partially built block is removed before the error returns.
fn dom_to_block_headless(xml: &XmlElement, ws: &mut Workspace) -> Result<BlockId, XmlError> {
    if xml.name != "block" && xml.name != "shadow" {
        return Err(XmlError::UnexpectedElement {
            found: xml.name.clone(),
            expected: "block",
        });
    }
    let block_type = xml.attr("type").ok_or_else(|| XmlError::MissingAttribute {
        element: xml.name.clone(),
        attribute: "type",
        block_id: xml.attr("id").map(BlockId::intern),
    })?;
    let requested = xml.attr("id").map(BlockId::intern);
    let id = ws
        .new_block_inner(block_type, requested)
        .map_err(|e| block_error(xml, e))?;
    match populate(xml, ws, id) {
        Ok(()) => Ok(id),
        Err(err) => {
            ws.remove_subtree(id);
            Err(err)
        }
    }
}

fn populate(xml: &XmlElement, ws: &mut Workspace, id: BlockId) -> Result<(), XmlError> {
    let wrap = |e: BlockError| block_error(xml, e);
    let wrap_conn = |e: ConnectionError| block_error(xml, BlockError::Connection(e));

    // Shadow status first: it constrains which children may attach.
    ws.require_mut(id).map_err(wrap)?.is_shadow = xml.name == "shadow";

    if let Some(mutation) = xml.child("mutation") {
        ws.apply_mutation(id, mutation).map_err(wrap)?;
    }

    for child in xml.elements() {
        match child.name.as_str() {
            "mutation" | "data" => {}
            "comment" => {
                let text = child.text();
                ws.require_mut(id).map_err(wrap)?.comment = (!text.is_empty()).then_some(text);
            }
            "field" => load_field(child, ws, id).map_err(wrap)?,
            "value" | "statement" => {
                let name = child.attr("name").ok_or_else(|| XmlError::MissingAttribute {
                    element: child.name.clone(),
                    attribute: "name",
                    block_id: Some(id),
                })?;
                if ws.require(id).map_err(wrap)?.input(name).is_none() {
                    log::warn!("ignoring non-existent input {name} in block {}", block_label(ws, id));
                    continue;
                }
                load_connection(child, ws, ConnectionRef::input(id, name))?;
            }
            "next" => {
                if ws.require(id).map_err(wrap)?.next.is_none() {
                    return Err(wrap_conn(ConnectionError::UnknownConnection(ConnectionRef::next(id))));
                }
                load_connection(child, ws, ConnectionRef::next(id))?;
            }
            other => log::warn!("ignoring unknown element <{other}> in block {}", block_label(ws, id)),
        }
    }

    let block = ws.require_mut(id).map_err(wrap)?;
    if let Some(inline) = bool_attr(xml, "inline") {
        block.inputs_inline = Some(inline);
    }
    if let Some(collapsed) = bool_attr(xml, "collapsed") {
        block.flags.collapsed = collapsed;
    }
    if let Some(disabled) = bool_attr(xml, "disabled") {
        block.flags.disabled = disabled;
    }
    if let Some(deletable) = bool_attr(xml, "deletable") {
        block.flags.deletable = deletable;
    }
    if let Some(movable) = bool_attr(xml, "movable") {
        block.flags.movable = movable;
    }
    if let Some(editable) = bool_attr(xml, "editable") {
        block.flags.editable = editable;
    }

    ws.ensure_default_variables(id).map_err(wrap)?;
    Ok(())
}

fn block_label(ws: &Workspace, id: BlockId) -> String {
    ws.block(id)
        .map(|b: &Block| format!("{} ({})", b.id, b.block_type))
        .unwrap_or_else(|| id.to_string())
}

fn load_field(xml: &XmlElement, ws: &mut Workspace, id: BlockId) -> Result<(), BlockError> {
    let Some(name) = xml.attr("name") else {
        log::warn!("ignoring <field> without a name in block {id}");
        return Ok(());
    };
    let Some(field) = ws.require(id)?.field(name) else {
        log::warn!("ignoring non-existent field {name} in block {}", block_label(ws, id));
        return Ok(());
    };
    let default_var_type = match &field.kind {
        FieldKind::Variable { variable_type, .. } => Some(variable_type.clone()),
        _ => None,
    };
    let text = xml.text();
    let value = match default_var_type {
        Some(default_type) => {
            let var_type = xml.attr("variabletype").unwrap_or(&default_type);
            resolve_variable(ws, xml.attr("id"), &text, var_type)?
                .as_str()
                .to_string()
        }
        None => text,
    };
    let field = ws
        .require_mut(id)?
        .field_mut(name)
        .ok_or_else(|| BlockError::UnknownField {
            block: id,
            name: crate::id::Name::intern(name),
        })?;
    field.set_value(&value)
}

/// Find the variable a field refers to: by id first, then by name and
/// type, creating it when neither exists.
fn resolve_variable(
    ws: &mut Workspace,
    id: Option<&str>,
    name: &str,
    var_type: &str,
) -> Result<VariableId, BlockError> {
    if let Some(id) = id.map(VariableId::intern)
        && ws.variable(id).is_some()
    {
        return Ok(id);
    }
    if let Some(existing) = ws.variables().by_name_and_type(name, var_type) {
        return Ok(existing.id);
    }
    let model = ws.create_variable(name, var_type, id.map(VariableId::intern))?;
    Ok(model.id)
}

/// Load the contents of a `<value>`, `<statement>` or `<next>` element.
fn load_connection(xml: &XmlElement, ws: &mut Workspace, parent: ConnectionRef) -> Result<(), XmlError> {
    let shadow = xml.child("shadow");
    let real = xml.child("block");

    if let Some(shadow) = shadow
        && let Some(conn) = ws.connection_mut(parent)
    {
        conn.shadow = Some(shadow.clone());
    }

    let Some(child_xml) = real.or(shadow) else {
        return Ok(());
    };
    let child = dom_to_block_headless(child_xml, ws)?;
    if let Err(err) = attach(ws, child, parent) {
        ws.remove_subtree(child);
        return Err(block_error(child_xml, err));
    }
    Ok(())
}

fn attach(ws: &mut Workspace, child: BlockId, parent: ConnectionRef) -> Result<(), BlockError> {
    let slot = ws
        .require(child)?
        .parent_facing_slot()
        .ok_or(ConnectionError::UnknownConnection(ConnectionRef::output(child)))?;
    ws.connect(ConnectionRef::new(child, slot), parent)?;
    Ok(())
}
