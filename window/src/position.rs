//! Slot-index arithmetic.
//!
//! A timestamp maps to slot `floor(ms / slot_size_ms)` in absolute epoch
//! time, so indices are stable across window computations taken at
//! different moments. The window is `[right - slot_amount, right]` where
//! `right` is the slot index of "now".

use chrono::{DateTime, Utc};

/// Where a slot index sits relative to the current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelativePosition {
    /// Ahead of now's slot.
    Lead,
    In,
    /// Before the window's left edge.
    Behind,
}

/// Inclusive slot-index bounds of the current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowBounds {
    pub left: i64,
    pub right: i64,
}

impl WindowBounds {
    pub fn classify(&self, slot_index: i64) -> RelativePosition {
        if slot_index < self.left {
            RelativePosition::Behind
        } else if slot_index > self.right {
            RelativePosition::Lead
        } else {
            RelativePosition::In
        }
    }
}

/// Window bounds, plus the slot index and classification of a target
/// timestamp when one was supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowPosition {
    pub slot_index: Option<i64>,
    pub bounds: WindowBounds,
    pub relative_position: Option<RelativePosition>,
}

/// Fixed geometry of a window: how many slots and how wide each one is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub slot_amount: i64,
    pub slot_size_ms: i64,
}

impl Geometry {
    pub fn slot_index(&self, t: DateTime<Utc>) -> i64 {
        t.timestamp_millis().div_euclid(self.slot_size_ms)
    }

    pub fn bounds(&self, now: DateTime<Utc>) -> WindowBounds {
        let right = self.slot_index(now);
        WindowBounds {
            left: right.saturating_sub(self.slot_amount),
            right,
        }
    }

    pub fn position(&self, now: DateTime<Utc>, at: Option<DateTime<Utc>>) -> WindowPosition {
        let bounds = self.bounds(now);
        let slot_index = at.map(|t| self.slot_index(t));

        WindowPosition {
            slot_index,
            bounds,
            relative_position: slot_index.map(|idx| bounds.classify(idx)),
        }
    }
}
