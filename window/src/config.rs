use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use common::time::{SystemClock, TimeProvider};
use tracing::warn;

use crate::error::WindowError;

pub const DEFAULT_SLOT_AMOUNT: i64 = 10;
pub const DEFAULT_SLOT_SIZE: Duration = Duration::from_secs(1);
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(10);
/// Longest accepted drain interval (one year).
pub const MAX_DRAIN_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub const ENV_SLOT_AMOUNT: &str = "ROLLING_WINDOW_SLOT_AMOUNT";
pub const ENV_SLOT_SIZE_MS: &str = "ROLLING_WINDOW_SLOT_SIZE_MS";
pub const ENV_DRAIN_INTERVAL_MS: &str = "ROLLING_WINDOW_DRAIN_INTERVAL_MS";
pub const ENV_VERBOSE: &str = "ROLLING_WINDOW_VERBOSE";

/// Construction-time settings of a [`RollingWindow`](crate::RollingWindow).
/// Fixed for the lifetime of the window.
#[derive(Clone)]
pub struct WindowConfig {
    /// Number of slots behind now's slot that still count as "in window".
    ///
    /// Together with `slot_size` this is the retention horizon: a value is
    /// readable via the current window for `slot_amount * slot_size`.
    pub slot_amount: i64,

    /// Width of one slot. Must be at least one millisecond; sub-millisecond
    /// precision is ignored.
    pub slot_size: Duration,

    /// Period of the background sweep that evicts slots behind the window.
    ///
    /// Expired slots stay in memory for up to one interval after they
    /// leave the window.
    pub drain_interval: Duration,

    /// Source of "now". Inject a manual clock for deterministic tests.
    pub time_provider: Arc<dyn TimeProvider>,

    /// Emit per-slot diagnostics (creation, eviction, coalesced drains).
    pub verbose: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            slot_amount: DEFAULT_SLOT_AMOUNT,
            slot_size: DEFAULT_SLOT_SIZE,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            time_provider: Arc::new(SystemClock),
            verbose: false,
        }
    }
}

impl fmt::Debug for WindowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowConfig")
            .field("slot_amount", &self.slot_amount)
            .field("slot_size", &self.slot_size)
            .field("drain_interval", &self.drain_interval)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl WindowConfig {
    /// Defaults overridden by `ROLLING_WINDOW_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    /// Unparsable values are logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let slot_amount = parse_or(&lookup, ENV_SLOT_AMOUNT, defaults.slot_amount);
        let slot_size_ms = parse_or(
            &lookup,
            ENV_SLOT_SIZE_MS,
            defaults.slot_size.as_millis() as u64,
        );
        let drain_interval_ms = parse_or(
            &lookup,
            ENV_DRAIN_INTERVAL_MS,
            defaults.drain_interval.as_millis() as u64,
        );
        let verbose = lookup(ENV_VERBOSE)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.verbose);

        Self {
            slot_amount,
            slot_size: Duration::from_millis(slot_size_ms),
            drain_interval: Duration::from_millis(drain_interval_ms),
            verbose,
            ..defaults
        }
    }

    pub fn with_slots(mut self, amount: i64, size: Duration) -> Self {
        self.slot_amount = amount;
        self.slot_size = size;
        self
    }

    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    pub fn with_time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = provider;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// How long a write stays visible through the current window.
    pub fn retention(&self) -> Duration {
        self.slot_size
            .saturating_mul(u32::try_from(self.slot_amount.max(0)).unwrap_or(u32::MAX))
    }

    /// Slot width in whole milliseconds, after validation.
    pub(crate) fn validate(&self) -> Result<i64, WindowError> {
        if self.slot_amount <= 0 {
            return Err(WindowError::InvalidConfig(format!(
                "slot_amount must be > 0, got {}",
                self.slot_amount
            )));
        }

        let slot_size_ms = i64::try_from(self.slot_size.as_millis()).map_err(|_| {
            WindowError::InvalidConfig(format!("slot_size {:?} is too large", self.slot_size))
        })?;
        if slot_size_ms < 1 {
            return Err(WindowError::InvalidConfig(format!(
                "slot_size must be at least 1ms, got {:?}",
                self.slot_size
            )));
        }
        if slot_size_ms.checked_mul(self.slot_amount).is_none() {
            return Err(WindowError::InvalidConfig(
                "slot_amount * slot_size overflows".into(),
            ));
        }

        if self.drain_interval.is_zero() {
            return Err(WindowError::InvalidConfig(
                "drain_interval must be > 0".into(),
            ));
        }
        if self.drain_interval > MAX_DRAIN_INTERVAL {
            return Err(WindowError::InvalidConfig(format!(
                "drain_interval must be at most {MAX_DRAIN_INTERVAL:?}, got {:?}",
                self.drain_interval
            )));
        }

        Ok(slot_size_ms)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display + Copy,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, fallback = %default, "ignoring unparsable config value");
            default
        }),
    }
}
