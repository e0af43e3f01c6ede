// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events produced by a [`Stage`](crate::Stage).
//!
//! The stage does not call back into host code. It queues [`StageEvent`]s for
//! nodes that registered the matching [`Interest`] and the host drains them
//! after each input call or update. Bubbling events are queued once, for the
//! deepest target; the host walks [`Scene::ancestors`](crate::Scene::ancestors)
//! if it wants capture/bubble propagation.

use core::time::Duration;

use kurbo::Point;

use crate::node::{Interest, NodeId};
use crate::pointer::PointerId;

/// Kind of a [`StageEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A pointer was pressed inside the stage. Targets the root.
    StageMouseDown,
    /// A pointer moved. Targets the root.
    StageMouseMove,
    /// A pressed pointer was released. Targets the root.
    StageMouseUp,
    /// The mouse pointer entered the stage bounds. Targets the root.
    MouseEnter,
    /// The mouse pointer left the stage bounds. Targets the root.
    MouseLeave,
    /// A pointer was pressed on the target.
    MouseDown,
    /// A captured pointer moved.
    PressMove,
    /// A captured pointer was released.
    PressUp,
    /// Press and release landed on the same target.
    Click,
    /// Double click on the target.
    DoubleClick,
    /// The pointer moved onto the target.
    MouseOver,
    /// The pointer moved off the target.
    MouseOut,
    /// The pointer moved onto the target or one of its descendants.
    RollOver,
    /// The pointer left the target and all of its descendants.
    RollOut,
    /// Start of a tick. Targets the root.
    TickStart,
    /// A node was ticked.
    Tick,
    /// End of a tick. Targets the root.
    TickEnd,
    /// Start of a draw. Targets the root.
    DrawStart,
    /// End of a draw. Targets the root.
    DrawEnd,
}

impl EventKind {
    /// Whether listeners on ancestors of the target should also see it.
    pub fn bubbles(self) -> bool {
        matches!(
            self,
            Self::MouseDown
                | Self::PressMove
                | Self::PressUp
                | Self::Click
                | Self::DoubleClick
                | Self::MouseOver
                | Self::MouseOut
        )
    }

    /// The interest bit that subscribes to this kind.
    pub fn interest(self) -> Interest {
        match self {
            Self::StageMouseDown => Interest::STAGE_MOUSE_DOWN,
            Self::StageMouseMove => Interest::STAGE_MOUSE_MOVE,
            Self::StageMouseUp => Interest::STAGE_MOUSE_UP,
            Self::MouseEnter => Interest::MOUSE_ENTER,
            Self::MouseLeave => Interest::MOUSE_LEAVE,
            Self::MouseDown => Interest::MOUSE_DOWN,
            Self::PressMove => Interest::PRESS_MOVE,
            Self::PressUp => Interest::PRESS_UP,
            Self::Click => Interest::CLICK,
            Self::DoubleClick => Interest::DOUBLE_CLICK,
            Self::MouseOver => Interest::MOUSE_OVER,
            Self::MouseOut => Interest::MOUSE_OUT,
            Self::RollOver => Interest::ROLL_OVER,
            Self::RollOut => Interest::ROLL_OUT,
            Self::TickStart => Interest::TICK_START,
            Self::Tick => Interest::TICK,
            Self::TickEnd => Interest::TICK_END,
            Self::DrawStart => Interest::DRAW_START,
            Self::DrawEnd => Interest::DRAW_END,
        }
    }
}

/// Pointer details attached to pointer events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInfo {
    /// Which pointer.
    pub id: PointerId,
    /// Whether it is the primary pointer.
    pub primary: bool,
    /// Position in stage coordinates, clamped or held when out of bounds.
    pub stage: Point,
    /// Unclamped position in stage coordinates.
    pub raw: Point,
}

/// An event queued by the stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageEvent {
    /// What happened.
    pub kind: EventKind,
    /// Deepest node the event is about.
    pub target: NodeId,
    /// The other node in over/out/roll transitions.
    pub related_target: Option<NodeId>,
    /// Pointer details, for pointer events.
    pub pointer: Option<PointerInfo>,
}

impl StageEvent {
    /// Whether listeners on ancestors of the target should also see it.
    pub fn bubbles(&self) -> bool {
        self.kind.bubbles()
    }
}

/// Timing information passed down a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickParams {
    /// Time since the previous tick.
    pub delta: Duration,
    /// Host clock at this tick.
    pub time: Duration,
    /// Whether the host considers the timeline paused.
    pub paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_over_and_out_bubble_but_rolls_do_not() {
        assert!(EventKind::MouseOver.bubbles());
        assert!(EventKind::MouseOut.bubbles());
        assert!(!EventKind::RollOver.bubbles());
        assert!(!EventKind::RollOut.bubbles());
        assert!(!EventKind::StageMouseMove.bubbles());
    }

    #[test]
    fn pointer_kinds_map_into_pointer_interest() {
        for kind in [
            EventKind::MouseDown,
            EventKind::Click,
            EventKind::DoubleClick,
            EventKind::PressMove,
            EventKind::PressUp,
            EventKind::MouseOver,
            EventKind::MouseOut,
            EventKind::RollOver,
            EventKind::RollOut,
        ] {
            assert!(Interest::POINTER.contains(kind.interest()), "{kind:?}");
        }
        assert!(!Interest::POINTER.intersects(EventKind::Tick.interest()));
    }
}
