//! Pointer gestures.
//!
//! A gesture follows one pointer from press to release and decides whether
//! it was a click or a drag:
//!
//! ```text
//! NotStarted ──press──▶ Deciding ──moved past drag radius──▶ Dragging
//!                           │                                   │
//!                        release                             release
//!                           ▼                                   ▼
//!                         Ended ◀───────────────────────────────┘
//!            (any state) ──cancel──▶ Cancelled
//! ```
//!
//! `GestureHandler` owns the live gestures, one per pointer, and refuses
//! new ones past the configured cap.

use crate::error::EditorError;
use crate::input::PointerId;
use brick_core::coordinate::Coordinate;
use brick_core::id::BlockId;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    NotStarted,
    /// Pressed; not yet moved far enough to count as a drag.
    Deciding,
    Dragging,
    Ended,
    Cancelled,
}

/// What a finished gesture amounted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureKind {
    Click { target: Option<BlockId> },
    Drag { target: Option<BlockId>, delta: Coordinate },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pointer: PointerId,
    state: GestureState,
    start: Coordinate,
    current: Coordinate,
    /// Block under the pointer at press time.
    target: Option<BlockId>,
    drag_radius: f64,
}

impl Gesture {
    pub fn new(pointer: PointerId, drag_radius: f64) -> Self {
        Self {
            pointer,
            state: GestureState::NotStarted,
            start: Coordinate::ZERO,
            current: Coordinate::ZERO,
            target: None,
            drag_radius,
        }
    }

    pub fn pointer(&self) -> PointerId {
        self.pointer
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn target(&self) -> Option<BlockId> {
        self.target
    }

    pub fn start(&self) -> Coordinate {
        self.start
    }

    /// Pointer travel since the press.
    pub fn delta(&self) -> Coordinate {
        self.current - self.start
    }

    pub fn is_dragging(&self) -> bool {
        self.state == GestureState::Dragging
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GestureState::Deciding | GestureState::Dragging)
    }

    pub fn press(&mut self, at: Coordinate, target: Option<BlockId>) {
        if self.state != GestureState::NotStarted {
            return;
        }
        self.start = at;
        self.current = at;
        self.target = target;
        self.state = GestureState::Deciding;
    }

    /// Track the pointer. Returns `true` on the move that turns the
    /// gesture into a drag.
    pub fn update(&mut self, at: Coordinate) -> bool {
        if !self.is_active() {
            return false;
        }
        self.current = at;
        if self.state == GestureState::Deciding && self.start.distance(at) > self.drag_radius {
            log::debug!("gesture {} became a drag", self.pointer);
            self.state = GestureState::Dragging;
            return true;
        }
        false
    }

    pub fn release(&mut self, at: Coordinate) -> GestureKind {
        let kind = match self.state {
            GestureState::Deciding => GestureKind::Click {
                target: self.target,
            },
            GestureState::Dragging => {
                self.current = at;
                GestureKind::Drag {
                    target: self.target,
                    delta: self.delta(),
                }
            }
            _ => GestureKind::Cancelled,
        };
        if self.is_active() {
            self.state = GestureState::Ended;
        }
        kind
    }

    pub fn cancel(&mut self) {
        if self.state != GestureState::Ended {
            self.state = GestureState::Cancelled;
        }
    }
}

/// Live gestures, at most one per pointer.
#[derive(Debug, Clone)]
pub struct GestureHandler {
    gestures: SmallVec<[Gesture; 2]>,
    max_gestures: usize,
    drag_radius: f64,
}

impl GestureHandler {
    pub fn new(max_gestures: usize, drag_radius: f64) -> Self {
        Self {
            gestures: SmallVec::new(),
            max_gestures,
            drag_radius,
        }
    }

    /// Start a gesture for `pointer`. Fails if that pointer already has one
    /// or the cap is reached.
    pub fn start(
        &mut self,
        pointer: PointerId,
        at: Coordinate,
        target: Option<BlockId>,
    ) -> Result<&mut Gesture, EditorError> {
        if self.get(pointer).is_some() {
            return Err(EditorError::GestureInProgress(pointer));
        }
        if self.gestures.len() >= self.max_gestures {
            return Err(EditorError::TooManyGestures(self.max_gestures));
        }
        let mut gesture = Gesture::new(pointer, self.drag_radius);
        gesture.press(at, target);
        self.gestures.push(gesture);
        let last = self.gestures.len() - 1;
        Ok(&mut self.gestures[last])
    }

    pub fn get(&self, pointer: PointerId) -> Option<&Gesture> {
        self.gestures.iter().find(|g| g.pointer == pointer)
    }

    pub fn get_mut(&mut self, pointer: PointerId) -> Option<&mut Gesture> {
        self.gestures.iter_mut().find(|g| g.pointer == pointer)
    }

    /// Remove and return a pointer's gesture.
    pub fn finish(&mut self, pointer: PointerId) -> Result<Gesture, EditorError> {
        let index = self
            .gestures
            .iter()
            .position(|g| g.pointer == pointer)
            .ok_or(EditorError::NoGesture(pointer))?;
        Ok(self.gestures.remove(index))
    }

    /// Cancel and drop every live gesture. Returns the pointers affected.
    pub fn cancel_all(&mut self) -> Vec<PointerId> {
        self.gestures
            .drain(..)
            .map(|mut g| {
                g.cancel();
                g.pointer
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    /// The pointer currently dragging, if any.
    pub fn dragging(&self) -> Option<PointerId> {
        self.gestures.iter().find(|g| g.is_dragging()).map(|g| g.pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    #[test]
    fn short_travel_is_a_click() {
        let block = BlockId::intern("g1");
        let mut g = Gesture::new(PointerId::MOUSE, 5.0);
        assert_eq!(g.state(), GestureState::NotStarted);
        g.press(at(10.0, 10.0), Some(block));
        assert_eq!(g.state(), GestureState::Deciding);
        assert!(!g.update(at(13.0, 13.0)));
        assert_eq!(g.release(at(13.0, 13.0)), GestureKind::Click { target: Some(block) });
        assert_eq!(g.state(), GestureState::Ended);
    }

    #[test]
    fn travel_past_radius_starts_a_drag_once() {
        let mut g = Gesture::new(PointerId::MOUSE, 5.0);
        g.press(at(0.0, 0.0), None);
        assert!(g.update(at(6.0, 0.0)));
        assert!(g.is_dragging());
        assert!(!g.update(at(20.0, 0.0)));
        assert_eq!(
            g.release(at(30.0, 4.0)),
            GestureKind::Drag {
                target: None,
                delta: at(30.0, 4.0)
            }
        );
    }

    #[test]
    fn cancelled_gesture_ignores_further_input() {
        let mut g = Gesture::new(PointerId::MOUSE, 5.0);
        g.press(at(0.0, 0.0), None);
        g.cancel();
        assert_eq!(g.state(), GestureState::Cancelled);
        assert!(!g.update(at(50.0, 0.0)));
        assert_eq!(g.release(at(50.0, 0.0)), GestureKind::Cancelled);
        assert_eq!(g.state(), GestureState::Cancelled);
    }

    #[test]
    fn one_gesture_per_pointer() {
        let mut handler = GestureHandler::new(10, 5.0);
        handler.start(PointerId(1), at(0.0, 0.0), None).unwrap();
        assert_eq!(
            handler.start(PointerId(1), at(5.0, 5.0), None).unwrap_err(),
            EditorError::GestureInProgress(PointerId(1))
        );
        handler.start(PointerId(2), at(5.0, 5.0), None).unwrap();
        assert_eq!(handler.len(), 2);
    }

    #[test]
    fn cap_limits_simultaneous_gestures() {
        let mut handler = GestureHandler::new(2, 5.0);
        handler.start(PointerId(1), at(0.0, 0.0), None).unwrap();
        handler.start(PointerId(2), at(0.0, 0.0), None).unwrap();
        assert_eq!(
            handler.start(PointerId(3), at(0.0, 0.0), None).unwrap_err(),
            EditorError::TooManyGestures(2)
        );
        handler.finish(PointerId(1)).unwrap();
        assert!(handler.start(PointerId(3), at(0.0, 0.0), None).is_ok());
    }

    #[test]
    fn finishing_an_unknown_pointer_fails() {
        let mut handler = GestureHandler::new(10, 5.0);
        assert_eq!(
            handler.finish(PointerId(9)).unwrap_err(),
            EditorError::NoGesture(PointerId(9))
        );
    }

    #[test]
    fn cancel_all_empties_the_handler() {
        let mut handler = GestureHandler::new(10, 5.0);
        handler.start(PointerId(1), at(0.0, 0.0), None).unwrap();
        handler.start(PointerId(2), at(0.0, 0.0), None).unwrap();
        assert_eq!(handler.cancel_all(), vec![PointerId(1), PointerId(2)]);
        assert!(handler.is_empty());
    }
}
