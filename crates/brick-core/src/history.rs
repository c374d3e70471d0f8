//! Event dispatch and the undo/redo stacks.
//!
//! Every fired event is recorded (when undo recording is on) and handed to
//! each change listener. Consecutive events that share a group id form one
//! undo step. An operation that opens a group only closes it again if no
//! group was active when it started, so callers can wrap several
//! operations in one step.

use crate::events::Event;
use crate::id::GroupId;
use std::collections::VecDeque;

/// Handle returned by `add_listener`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&Event)>;

pub struct EventHistory {
    undo_stack: VecDeque<Event>,
    redo_stack: Vec<Event>,
    /// Maximum undo depth.
    max_undo: usize,
    group: Option<GroupId>,
    record_undo: bool,
    /// Events fire only while this is zero.
    disabled: usize,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl std::fmt::Debug for EventHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHistory")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("group", &self.group)
            .field("record_undo", &self.record_undo)
            .field("disabled", &self.disabled)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventHistory {
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo,
            group: None,
            record_undo: true,
            disabled: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // ─── Enable / disable ────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.disabled == 0
    }

    /// Suppress events. Calls nest; each must be paired with `enable`.
    pub fn disable(&mut self) {
        self.disabled += 1;
    }

    pub fn enable(&mut self) {
        self.disabled = self.disabled.saturating_sub(1);
    }

    // ─── Groups ──────────────────────────────────────────────────────────

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
    }

    /// Open a fresh group unless one is already active. Returns whether a
    /// group was opened; pass that to [`end_group`](Self::end_group).
    pub fn begin_group(&mut self) -> bool {
        if self.group.is_some() {
            return false;
        }
        self.group = Some(GroupId::generate());
        true
    }

    pub fn end_group(&mut self, opened: bool) {
        if opened {
            self.group = None;
        }
    }

    pub fn record_undo(&self) -> bool {
        self.record_undo
    }

    /// Returns the previous setting.
    pub fn set_record_undo(&mut self, record: bool) -> bool {
        std::mem::replace(&mut self.record_undo, record)
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    /// Record and broadcast an event. Ignored while disabled.
    pub fn fire(&mut self, event: Event) {
        if !self.is_enabled() {
            return;
        }
        log::trace!("fire {} {:?}", event.kind.name(), event.block_id());
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
        if event.record_undo {
            self.redo_stack.clear();
            self.undo_stack.push_back(event);
            while self.undo_stack.len() > self.max_undo {
                self.undo_stack.pop_front();
            }
        }
    }

    pub fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    // ─── Stacks ──────────────────────────────────────────────────────────

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn set_max_undo(&mut self, max_undo: usize) {
        self.max_undo = max_undo;
        while self.undo_stack.len() > self.max_undo {
            self.undo_stack.pop_front();
        }
    }

    /// Pop the newest event group from the undo (or redo) stack and move it
    /// to the opposite stack. Returned newest first.
    pub(crate) fn take_step(&mut self, redo: bool) -> Vec<Event> {
        let mut step = Vec::new();
        let Some(first) = self.pop(redo) else {
            return step;
        };
        let group = first.group;
        step.push(first);
        if let Some(group) = group {
            while self.peek(redo).is_some_and(|e| e.group == Some(group)) {
                let Some(event) = self.pop(redo) else { break };
                step.push(event);
            }
        }
        for event in &step {
            if redo {
                self.undo_stack.push_back(event.clone());
            } else {
                self.redo_stack.push(event.clone());
            }
        }
        step
    }

    fn pop(&mut self, redo: bool) -> Option<Event> {
        if redo {
            self.redo_stack.pop()
        } else {
            self.undo_stack.pop_back()
        }
    }

    fn peek(&self, redo: bool) -> Option<&Event> {
        if redo {
            self.redo_stack.last()
        } else {
            self.undo_stack.back()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeElement, EventKind};
    use crate::id::{BlockId, WorkspaceId};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn comment(group: Option<GroupId>, record: bool) -> Event {
        Event {
            kind: EventKind::Change {
                block_id: BlockId::intern("h1"),
                element: ChangeElement::Comment,
                old_value: None,
                new_value: Some("x".into()),
            },
            workspace_id: WorkspaceId::intern("history_ws"),
            group,
            record_undo: record,
        }
    }

    #[test]
    fn fire_records_and_trims() {
        let mut h = EventHistory::new(2);
        for _ in 0..3 {
            h.fire(comment(None, true));
        }
        assert_eq!(h.undo_len(), 2);
        h.fire(comment(None, false));
        assert_eq!(h.undo_len(), 2);
    }

    #[test]
    fn disabled_history_drops_events() {
        let mut h = EventHistory::new(10);
        h.disable();
        h.fire(comment(None, true));
        h.enable();
        assert_eq!(h.undo_len(), 0);
    }

    #[test]
    fn take_step_pulls_whole_group() {
        let mut h = EventHistory::new(10);
        let g = GroupId::intern("g_step");
        h.fire(comment(None, true));
        h.fire(comment(Some(g), true));
        h.fire(comment(Some(g), true));
        let step = h.take_step(false);
        assert_eq!(step.len(), 2);
        assert_eq!(h.undo_len(), 1);
        assert_eq!(h.redo_len(), 2);
    }

    #[test]
    fn inner_group_joins_outer() {
        let mut h = EventHistory::new(10);
        assert!(h.begin_group());
        let outer = h.group();
        let opened = h.begin_group();
        assert!(!opened);
        h.end_group(opened);
        assert_eq!(h.group(), outer);
        h.end_group(true);
        assert_eq!(h.group(), None);
    }

    #[test]
    fn listeners_see_events_until_removed() {
        let mut h = EventHistory::new(10);
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        let id = h.add_listener(Box::new(move |_| *counter.borrow_mut() += 1));
        h.fire(comment(None, true));
        assert!(h.remove_listener(id));
        h.fire(comment(None, true));
        assert_eq!(*seen.borrow(), 1);
    }
}
