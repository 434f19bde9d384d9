use thiserror::Error;

/// Internal order list and key index disagree.
///
/// Only produced by [`LinkedMap::check_invariants`](crate::LinkedMap::check_invariants);
/// seeing one means a bug in this crate, not a recoverable runtime condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("linked map invariant violated: {0}")]
pub struct InvariantError(String);

impl InvariantError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
