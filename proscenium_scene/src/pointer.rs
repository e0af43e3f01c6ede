// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pointer state and hover polling.
//!
//! ## Usage
//!
//! 1) Fetch or create a record with [`PointerTable::entry`] whenever a pointer
//!    reports a position. The first pointer recorded while no primary exists
//!    becomes the primary pointer.
//! 2) Update the record's position and press state as input arrives.
//! 3) Call [`PointerTable::release`] when the pointer goes away. A destructive
//!    release drops the record and frees the primary slot.
//!
//! ```
//! use proscenium_scene::pointer::{PointerId, PointerTable};
//!
//! let mut table = PointerTable::default();
//! table.entry(PointerId(3));
//! table.entry(PointerId(4));
//! assert_eq!(table.primary(), Some(PointerId(3)));
//!
//! table.release(PointerId(3), true);
//! assert_eq!(table.primary(), None);
//! assert!(table.get(PointerId(4)).is_some());
//! ```

use core::time::Duration;

use hashbrown::HashMap;
use kurbo::{Point, Vec2};

use crate::node::NodeId;

/// Identifies one pointer across its down/move/up sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub i64);

impl PointerId {
    /// The mouse.
    pub const MOUSE: Self = Self(-1);
}

/// State tracked for one pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerRecord {
    /// Stage position, clamped or held while out of bounds.
    pub position: Point,
    /// Unclamped stage position.
    pub raw: Point,
    /// Whether the last reported position was inside the stage.
    pub in_bounds: bool,
    /// Whether a press started inside the stage and has not been released.
    pub down: bool,
    /// Node hit by the current press. While set, moves and the release of
    /// this pointer are routed to it without hit testing.
    pub target: Option<NodeId>,
    /// Stage position of the current press.
    pub press_origin: Option<Point>,
}

impl PointerRecord {
    /// Offset from the press position, while pressed.
    pub fn press_offset(&self) -> Option<Vec2> {
        self.press_origin.map(|origin| self.position - origin)
    }

    fn end_press(&mut self) {
        self.target = None;
        self.press_origin = None;
    }
}

/// Pointer records keyed by id, plus primary-pointer bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct PointerTable {
    records: HashMap<PointerId, PointerRecord>,
    primary: Option<PointerId>,
}

impl PointerTable {
    /// The record for `id`, if tracked.
    pub fn get(&self, id: PointerId) -> Option<&PointerRecord> {
        self.records.get(&id)
    }

    /// Mutable record for `id`, if tracked.
    pub fn get_mut(&mut self, id: PointerId) -> Option<&mut PointerRecord> {
        self.records.get_mut(&id)
    }

    /// The record for `id`, created if needed.
    ///
    /// A new record becomes primary when no primary is assigned.
    pub fn entry(&mut self, id: PointerId) -> &mut PointerRecord {
        if !self.records.contains_key(&id) {
            log::trace!("tracking pointer {id:?}");
            if self.primary.is_none() {
                self.primary = Some(id);
            }
        }
        self.records.entry(id).or_default()
    }

    /// Ends the current press of `id`.
    ///
    /// With `clear` the record is dropped and, if it was primary, the primary
    /// slot is freed. Otherwise the record is kept with its press state reset.
    pub fn release(&mut self, id: PointerId, clear: bool) {
        if clear {
            if self.records.remove(&id).is_some() {
                log::trace!("dropped pointer {id:?}");
            }
            if self.primary == Some(id) {
                self.primary = None;
            }
        } else if let Some(record) = self.records.get_mut(&id) {
            record.end_press();
        }
    }

    /// The primary pointer.
    pub fn primary(&self) -> Option<PointerId> {
        self.primary
    }

    /// Whether `id` is the primary pointer.
    pub fn is_primary(&self, id: PointerId) -> bool {
        self.primary == Some(id)
    }

    /// Number of tracked pointers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no pointers are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over tracked pointers in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (PointerId, &PointerRecord)> {
        self.records.iter().map(|(&id, record)| (id, record))
    }
}

/// Highest hover poll rate, in polls per second.
pub const MAX_HOVER_FREQUENCY: u32 = 50;

/// Rate limiter for hover re-testing, driven by a host clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoverPoller {
    interval: Duration,
    last: Option<Duration>,
}

impl HoverPoller {
    /// A poller firing `frequency` times per second, at most
    /// [`MAX_HOVER_FREQUENCY`]. Returns `None` for a frequency of zero.
    pub fn new(frequency: u32) -> Option<Self> {
        if frequency == 0 {
            return None;
        }
        let frequency = frequency.min(MAX_HOVER_FREQUENCY);
        Some(Self {
            interval: Duration::from_millis(u64::from(1000 / frequency)),
            last: None,
        })
    }

    /// Time between polls.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a poll is due at `now`. Records `now` when it is.
    ///
    /// The first call is always due. A clock that goes backwards restarts
    /// the interval.
    pub fn due(&mut self, now: Duration) -> bool {
        let due = match self.last {
            None => true,
            Some(last) if now < last => true,
            Some(last) => now - last >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pointer_becomes_primary() {
        let mut table = PointerTable::default();
        table.entry(PointerId(7));
        table.entry(PointerId::MOUSE);
        assert_eq!(table.primary(), Some(PointerId(7)));
        assert!(!table.is_primary(PointerId::MOUSE));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn destructive_release_frees_primary_slot() {
        let mut table = PointerTable::default();
        table.entry(PointerId(1));
        table.entry(PointerId(2));
        table.release(PointerId(1), true);
        assert_eq!(table.primary(), None);
        table.entry(PointerId(2));
        assert_eq!(table.primary(), None);
        table.entry(PointerId(3));
        assert_eq!(table.primary(), Some(PointerId(3)));
    }

    #[test]
    fn non_destructive_release_keeps_record() {
        let mut table = PointerTable::default();
        let record = table.entry(PointerId::MOUSE);
        record.down = true;
        record.position = Point::new(4.0, 4.0);
        record.press_origin = Some(Point::new(1.0, 2.0));
        assert_eq!(record.press_offset(), Some(Vec2::new(3.0, 2.0)));

        table.release(PointerId::MOUSE, false);
        let record = table.get(PointerId::MOUSE).unwrap();
        assert!(record.target.is_none());
        assert_eq!(record.press_offset(), None);
        assert_eq!(record.position, Point::new(4.0, 4.0));
        assert!(table.is_primary(PointerId::MOUSE));
    }

    #[test]
    fn poller_interval_is_clamped() {
        assert_eq!(HoverPoller::new(0), None);
        assert_eq!(
            HoverPoller::new(20).unwrap().interval(),
            Duration::from_millis(50)
        );
        assert_eq!(
            HoverPoller::new(500).unwrap().interval(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn poller_fires_once_per_interval() {
        let mut poller = HoverPoller::new(10).unwrap();
        assert!(poller.due(Duration::from_millis(0)));
        assert!(!poller.due(Duration::from_millis(50)));
        assert!(poller.due(Duration::from_millis(100)));
        assert!(!poller.due(Duration::from_millis(199)));
        assert!(poller.due(Duration::from_millis(30)));
    }
}
