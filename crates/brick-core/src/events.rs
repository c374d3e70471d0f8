//! Reversible change records.
//!
//! Every structural mutation of a workspace produces an [`Event`] carrying
//! enough state to invert it. Undo and redo replay these events; there is
//! no separate snapshot mechanism. Events also feed change listeners so
//! other views can stay in sync without re-walking the block tree.

use crate::coordinate::Coordinate;
use crate::dom::XmlElement;
use crate::error::EventError;
use crate::id::{BlockId, GroupId, Name, VariableId, WorkspaceId};
use crate::workspace::Workspace;
use crate::xml;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a block sits: under a parent (optionally in a named input) or
/// free on the workspace at a coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BlockId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_name: Option<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
}

/// Which property a change event touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeElement {
    Field(Name),
    Comment,
    Collapsed,
    Disabled,
    Inline,
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Create {
        block_id: BlockId,
        xml: XmlElement,
        /// The block and all descendants, parent first.
        ids: Vec<BlockId>,
    },
    Delete {
        block_id: BlockId,
        old_xml: XmlElement,
        ids: Vec<BlockId>,
    },
    Change {
        block_id: BlockId,
        element: ChangeElement,
        old_value: Option<String>,
        new_value: Option<String>,
    },
    Move {
        block_id: BlockId,
        old: Location,
        new: Location,
    },
    VarCreate {
        var_id: VariableId,
        var_type: String,
        var_name: String,
    },
    VarDelete {
        var_id: VariableId,
        var_type: String,
        var_name: String,
    },
    VarRename {
        var_id: VariableId,
        old_name: String,
        new_name: String,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Delete { .. } => "delete",
            Self::Change { .. } => "change",
            Self::Move { .. } => "move",
            Self::VarCreate { .. } => "var_create",
            Self::VarDelete { .. } => "var_delete",
            Self::VarRename { .. } => "var_rename",
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub workspace_id: WorkspaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    #[serde(default = "default_true")]
    pub record_undo: bool,
}

impl Event {
    pub fn block_id(&self) -> Option<BlockId> {
        match &self.kind {
            EventKind::Create { block_id, .. }
            | EventKind::Delete { block_id, .. }
            | EventKind::Change { block_id, .. }
            | EventKind::Move { block_id, .. } => Some(*block_id),
            _ => None,
        }
    }

    pub fn var_id(&self) -> Option<VariableId> {
        match &self.kind {
            EventKind::VarCreate { var_id, .. }
            | EventKind::VarDelete { var_id, .. }
            | EventKind::VarRename { var_id, .. } => Some(*var_id),
            _ => None,
        }
    }

    /// A null event records no change and is dropped by [`filter`].
    pub fn is_null(&self) -> bool {
        match &self.kind {
            EventKind::Change {
                old_value, new_value, ..
            } => old_value == new_value,
            EventKind::Move { old, new, .. } => old == new,
            _ => false,
        }
    }

    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::Json(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, EventError> {
        serde_json::from_str(json).map_err(|e| EventError::Json(e.to_string()))
    }

    /// Replay (`forward`) or revert this event against `ws`.
    ///
    /// Missing blocks are logged and skipped: replays run against whatever
    /// state the workspace is in, and one stale event must not abort an
    /// entire undo group.
    pub fn run(&self, ws: &mut Workspace, forward: bool) -> Result<(), EventError> {
        if self.workspace_id != ws.id() {
            return Err(EventError::WrongWorkspace {
                event: self.workspace_id.to_string(),
                workspace: ws.id().to_string(),
            });
        }
        match &self.kind {
            EventKind::Create { block_id, xml, ids } => {
                if forward {
                    load_snapshot(ws, xml)?;
                } else {
                    dispose_ids(ws, *block_id, ids, "uncreate");
                }
            }
            EventKind::Delete {
                block_id,
                old_xml,
                ids,
            } => {
                if forward {
                    dispose_ids(ws, *block_id, ids, "delete");
                } else {
                    load_snapshot(ws, old_xml)?;
                }
            }
            EventKind::Change {
                block_id,
                element,
                old_value,
                new_value,
            } => {
                if !ws.contains(*block_id) {
                    log::warn!("can't change non-existent block: {block_id}");
                    return Ok(());
                }
                let value = if forward { new_value } else { old_value };
                apply_change(ws, *block_id, *element, value.as_deref())?;
            }
            EventKind::Move { block_id, old, new } => {
                let target = if forward { new } else { old };
                run_move(ws, *block_id, target)?;
            }
            EventKind::VarCreate {
                var_id,
                var_type,
                var_name,
            } => {
                if forward {
                    ws.create_variable(var_name, var_type, Some(*var_id))?;
                } else {
                    ws.delete_variable(*var_id)?;
                }
            }
            EventKind::VarDelete {
                var_id,
                var_type,
                var_name,
            } => {
                if forward {
                    ws.delete_variable(*var_id)?;
                } else {
                    ws.create_variable(var_name, var_type, Some(*var_id))?;
                }
            }
            EventKind::VarRename {
                var_id,
                old_name,
                new_name,
            } => {
                let name = if forward { new_name } else { old_name };
                ws.rename_variable(*var_id, name)?;
            }
        }
        Ok(())
    }
}

fn load_snapshot(ws: &mut Workspace, snapshot: &XmlElement) -> Result<(), EventError> {
    let wrapper = XmlElement::new("xml").with_child(snapshot.clone());
    xml::dom_to_workspace(&wrapper, ws)?;
    Ok(())
}

fn dispose_ids(ws: &mut Workspace, root: BlockId, ids: &[BlockId], verb: &str) {
    for id in ids {
        if ws.contains(*id) {
            release_unlisted(ws, *id, ids);
            ws.force_dispose(*id);
        } else if *id == root {
            log::warn!("can't {verb} non-existent block: {id}");
        }
    }
}

/// Detach real blocks plugged into `id` that the event does not list, so
/// only the listed ids are removed. Unlisted shadows go with their parent.
fn release_unlisted(ws: &mut Workspace, id: BlockId, ids: &[BlockId]) {
    let strays: Vec<BlockId> = ws
        .descendant_ids(id)
        .into_iter()
        .filter(|b| !ids.contains(b))
        .filter(|b| ws.parent(*b).is_some_and(|p| ids.contains(&p)))
        .filter(|b| ws.block(*b).is_some_and(|block| !block.is_shadow))
        .collect();
    for stray in strays {
        let old = ws.location(stray);
        ws.remove_link(stray);
        log::debug!("kept {stray}, attached after {id} was recorded");
        ws.fire_move(stray, old);
    }
}

fn apply_change(
    ws: &mut Workspace,
    id: BlockId,
    element: ChangeElement,
    value: Option<&str>,
) -> Result<(), EventError> {
    let flag = value == Some("true");
    match element {
        ChangeElement::Field(name) => {
            ws.set_field_value(id, name.as_str(), value.unwrap_or_default())?;
        }
        ChangeElement::Comment => ws.set_comment(id, value.map(str::to_string))?,
        ChangeElement::Collapsed => ws.set_collapsed(id, flag)?,
        ChangeElement::Disabled => ws.set_enabled(id, !flag)?,
        ChangeElement::Inline => ws.set_inputs_inline(id, flag)?,
        ChangeElement::Mutation => {
            let mutation = match value {
                Some(text) if !text.is_empty() => crate::dom_parser::parse_xml(text)?,
                _ => XmlElement::new("mutation"),
            };
            ws.apply_mutation(id, &mutation)?;
        }
    }
    Ok(())
}

fn run_move(ws: &mut Workspace, id: BlockId, target: &Location) -> Result<(), EventError> {
    if !ws.contains(id) {
        log::warn!("can't move non-existent block: {id}");
        return Ok(());
    }
    if let Some(parent) = target.parent_id
        && !ws.contains(parent)
    {
        log::warn!("can't connect to non-existent block: {parent}");
        return Ok(());
    }
    if ws.parent(id).is_some() {
        ws.unplug(id, false)?;
    }
    match (target.parent_id, target.coordinate) {
        (None, Some(xy)) => ws.move_to(id, xy)?,
        (None, None) => {}
        (Some(parent), _) => {
            let Some(child_slot) = ws.require(id)?.parent_facing_slot() else {
                log::warn!("block {id} has no connection to attach with");
                return Ok(());
            };
            let parent_ref = match target.input_name {
                Some(name) => crate::connection::ConnectionRef::new(
                    parent,
                    crate::connection::ConnectionSlot::Input(name),
                ),
                None => crate::connection::ConnectionRef::next(parent),
            };
            if ws.connection(parent_ref).is_none() {
                log::warn!("can't connect to non-existent input: {parent_ref}");
                return Ok(());
            }
            let child_ref = crate::connection::ConnectionRef::new(id, child_slot);
            ws.connect(child_ref, parent_ref)
                .map_err(crate::error::BlockError::from)?;
        }
    }
    Ok(())
}

/// Merge and prune a batch of events before replay.
///
/// Runs of consecutive moves of one block collapse into a single move;
/// repeated changes to the same property collapse into one; null events
/// drop out; mutation changes move to the front so inputs exist before
/// anything connects to them. `forward` is false when the batch is in
/// reverse chronological order (undo).
pub fn filter(events: &[Event], forward: bool) -> Vec<Event> {
    let mut queue: Vec<Event> = events.to_vec();
    if !forward {
        queue.reverse();
    }

    #[derive(Hash, PartialEq, Eq)]
    enum Key {
        Block(&'static str, BlockId),
        Var(usize),
    }

    let mut merged: Vec<Event> = Vec::with_capacity(queue.len());
    // key -> (index into `merged`, index in `queue` of the last merged event)
    let mut seen: HashMap<Key, (usize, usize)> = HashMap::new();

    for (i, event) in queue.into_iter().enumerate() {
        if event.is_null() {
            continue;
        }
        let key = match event.block_id() {
            Some(id) => Key::Block(event.kind.name(), id),
            None => Key::Var(i),
        };
        let Some(&(slot, last_index)) = seen.get(&key) else {
            seen.insert(key, (merged.len(), i));
            merged.push(event);
            continue;
        };
        let absorbed = match (&mut merged[slot].kind, &event.kind) {
            (EventKind::Move { new, .. }, EventKind::Move { new: next_new, .. })
                if last_index + 1 == i =>
            {
                *new = next_new.clone();
                true
            }
            (
                EventKind::Change {
                    element, new_value, ..
                },
                EventKind::Change {
                    element: next_element,
                    new_value: next_value,
                    ..
                },
            ) if element == next_element => {
                *new_value = next_value.clone();
                true
            }
            _ => false,
        };
        if absorbed {
            seen.insert(key, (slot, i));
        } else {
            seen.insert(key, (merged.len(), i));
            merged.push(event);
        }
    }

    let mut out: Vec<Event> = merged.into_iter().filter(|e| !e.is_null()).collect();
    if !forward {
        out.reverse();
    }

    // Stable partition: mutation changes first.
    let (mut mutations, rest): (Vec<Event>, Vec<Event>) = out.into_iter().partition(|e| {
        matches!(
            e.kind,
            EventKind::Change {
                element: ChangeElement::Mutation,
                ..
            }
        )
    });
    mutations.extend(rest);
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ws_id() -> WorkspaceId {
        WorkspaceId::intern("filter_ws")
    }

    fn mv(block: &str, from: Option<&str>, to: Option<&str>) -> Event {
        let loc = |p: Option<&str>| Location {
            parent_id: p.map(BlockId::intern),
            input_name: None,
            coordinate: p.is_none().then_some(Coordinate::ZERO),
        };
        Event {
            kind: EventKind::Move {
                block_id: BlockId::intern(block),
                old: loc(from),
                new: loc(to),
            },
            workspace_id: ws_id(),
            group: None,
            record_undo: true,
        }
    }

    fn change(block: &str, field: &str, old: &str, new: &str) -> Event {
        Event {
            kind: EventKind::Change {
                block_id: BlockId::intern(block),
                element: ChangeElement::Field(Name::intern(field)),
                old_value: Some(old.into()),
                new_value: Some(new.into()),
            },
            workspace_id: ws_id(),
            group: None,
            record_undo: true,
        }
    }

    #[test]
    fn adjacent_moves_merge() {
        let events = vec![mv("c", Some("b"), None), mv("c", None, Some("a"))];
        let out = filter(&events, true);
        assert_eq!(out.len(), 1);
        match &out[0].kind {
            EventKind::Move { old, new, .. } => {
                assert_eq!(old.parent_id, Some(BlockId::intern("b")));
                assert_eq!(new.parent_id, Some(BlockId::intern("a")));
            }
            other => panic!("expected move, got {other:?}"),
        }
    }

    #[test]
    fn non_adjacent_moves_stay_separate() {
        let events = vec![
            mv("c", Some("b"), None),
            change("x", "NUM", "1", "2"),
            mv("c", None, Some("a")),
        ];
        assert_eq!(filter(&events, true).len(), 3);
    }

    #[test]
    fn changes_to_same_field_merge_and_null_drops() {
        let events = vec![change("x", "NUM", "1", "2"), change("x", "NUM", "2", "1")];
        assert!(filter(&events, true).is_empty());
    }

    #[test]
    fn undo_order_is_preserved() {
        // Undo batches arrive newest first and must come back newest first.
        let events = vec![change("y", "T", "a", "b"), change("x", "NUM", "1", "2")];
        let out = filter(&events, false);
        assert_eq!(out[0].block_id(), Some(BlockId::intern("y")));
    }

    #[test]
    fn mutations_move_to_front() {
        let mut mutation = change("x", "NUM", "", "<mutation elseif=\"1\"/>");
        if let EventKind::Change { element, .. } = &mut mutation.kind {
            *element = ChangeElement::Mutation;
        }
        let events = vec![mv("c", None, Some("x")), mutation];
        let out = filter(&events, true);
        assert!(matches!(
            out[0].kind,
            EventKind::Change {
                element: ChangeElement::Mutation,
                ..
            }
        ));
    }

    #[test]
    fn json_round_trip_keeps_type_tag() {
        let event = change("x", "NUM", "1", "2");
        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"change\""));
        assert_eq!(Event::from_json(&json).unwrap(), event);
    }

    #[test]
    fn create_json_carries_xml_text() {
        let event = Event {
            kind: EventKind::Create {
                block_id: BlockId::intern("n1"),
                xml: XmlElement::new("block").with_attr("type", "math_number"),
                ids: vec![BlockId::intern("n1")],
            },
            workspace_id: ws_id(),
            group: Some(GroupId::intern("g1")),
            record_undo: true,
        };
        let json = event.to_json().unwrap();
        assert!(json.contains(r#"<block type=\"math_number\"/>"#));
        assert_eq!(Event::from_json(&json).unwrap(), event);
    }
}
