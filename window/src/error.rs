use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The write maps to a slot before the window's left edge.
    #[error("element is behind of current window (slot {slot_index} < window left {left})")]
    BehindOfWindow { slot_index: i64, left: i64 },

    /// The write maps to a slot ahead of now's slot. The window is not
    /// advanced to include it.
    #[error("element is lead of current window (slot {slot_index} > window right {right})")]
    LeadOfWindow { slot_index: i64, right: i64 },

    #[error("invalid window config: {0}")]
    InvalidConfig(String),

    #[error("rolling window must be created inside a tokio runtime")]
    NoRuntime,
}

impl WindowError {
    pub fn is_behind(&self) -> bool {
        matches!(self, Self::BehindOfWindow { .. })
    }

    pub fn is_lead(&self) -> bool {
        matches!(self, Self::LeadOfWindow { .. })
    }
}
