//! Per-call options for writes and reads.

use chrono::{DateTime, Utc};

/// Options for [`RollingWindow::set`](crate::RollingWindow::set).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Timestamp to bucket the write under. `None` means "now" per the
    /// window's time provider.
    pub time: Option<DateTime<Utc>>,

    /// Set-if-absent: the write only succeeds if the key is not yet in the
    /// target slot.
    pub nx: bool,
}

impl SetOptions {
    pub fn nx() -> Self {
        Self {
            nx: true,
            ..Self::default()
        }
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            ..Self::default()
        }
    }

    pub fn with_nx(mut self, nx: bool) -> Self {
        self.nx = nx;
        self
    }
}

/// Options for [`RollingWindow::get`](crate::RollingWindow::get).
///
/// A read needs a selector: `current_window`, or at least one of
/// `after`/`before`. With none of them set, `get` performs no lookup.
/// `current_window` wins when combined with range bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Scan the live window oldest-to-newest; the oldest matching slot wins.
    pub current_window: bool,

    /// Lower bound (inclusive, slot granularity). Defaults to the oldest live slot.
    pub after: Option<DateTime<Utc>>,

    /// Upper bound (inclusive, slot granularity). Defaults to now's slot.
    pub before: Option<DateTime<Utc>>,
}

impl GetOptions {
    pub fn current_window() -> Self {
        Self {
            current_window: true,
            ..Self::default()
        }
    }

    pub fn after(t: DateTime<Utc>) -> Self {
        Self {
            after: Some(t),
            ..Self::default()
        }
    }

    pub fn before(t: DateTime<Utc>) -> Self {
        Self {
            before: Some(t),
            ..Self::default()
        }
    }

    pub fn between(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            current_window: false,
            after: Some(after),
            before: Some(before),
        }
    }

    pub(crate) fn selection(&self) -> Option<Selection> {
        if self.current_window {
            return Some(Selection::CurrentWindow);
        }
        if self.after.is_none() && self.before.is_none() {
            return None;
        }
        Some(Selection::Range {
            after: self.after,
            before: self.before,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Selection {
    CurrentWindow,
    Range {
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    },
}
