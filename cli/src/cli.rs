use std::time::Duration;

use clap::{Parser, ValueEnum};
use window::{GetOptions, SetOptions, WindowConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteMode {
    /// Last writer wins within a slot.
    Overwrite,
    /// Set-if-absent: only the first write of a key per slot succeeds.
    Nx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadMode {
    /// Scan the live window oldest-first.
    Current,
    /// Scan everything up to now, newest-first.
    Range,
}

#[derive(Debug, Parser)]
#[clap(name = "window-demo", version)]
pub struct Cli {
    /// Number of slots kept behind now's slot [env: ROLLING_WINDOW_SLOT_AMOUNT]
    #[clap(long)]
    pub slot_amount: Option<i64>,

    /// Width of one slot in milliseconds [env: ROLLING_WINDOW_SLOT_SIZE_MS]
    #[clap(long)]
    pub slot_size_ms: Option<u64>,

    /// Period of the background eviction sweep in milliseconds
    /// [env: ROLLING_WINDOW_DRAIN_INTERVAL_MS]
    #[clap(long)]
    pub drain_interval_ms: Option<u64>,

    /// Distinct keys written every tick
    #[clap(long, default_value_t = 4)]
    pub keys: usize,

    /// Number of write ticks to run
    #[clap(long, default_value_t = 12)]
    pub ticks: u32,

    /// Delay between write ticks in milliseconds
    #[clap(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    #[clap(long, value_enum, default_value_t = WriteMode::Overwrite)]
    pub write_mode: WriteMode,

    #[clap(long, value_enum, default_value_t = ReadMode::Current)]
    pub read_mode: ReadMode,

    /// Log slot creation and eviction [env: ROLLING_WINDOW_VERBOSE]
    #[clap(long)]
    pub verbose: bool,
}

impl Cli {
    /// Window settings: `ROLLING_WINDOW_*` env vars first, flags on top.
    pub(crate) fn window_config(&self) -> WindowConfig {
        self.apply(WindowConfig::from_env())
    }

    /// Overrides `base` with the flags that were given.
    fn apply(&self, mut base: WindowConfig) -> WindowConfig {
        if let Some(amount) = self.slot_amount {
            base.slot_amount = amount;
        }
        if let Some(ms) = self.slot_size_ms {
            base.slot_size = Duration::from_millis(ms);
        }
        if let Some(ms) = self.drain_interval_ms {
            base.drain_interval = Duration::from_millis(ms);
        }
        if self.verbose {
            base.verbose = true;
        }
        base
    }

    pub(crate) fn set_options(&self) -> SetOptions {
        SetOptions::default().with_nx(self.write_mode == WriteMode::Nx)
    }

    pub(crate) fn get_options(&self) -> GetOptions {
        match self.read_mode {
            ReadMode::Current => GetOptions::current_window(),
            ReadMode::Range => GetOptions::before(chrono::Utc::now()),
        }
    }

    pub(crate) fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
