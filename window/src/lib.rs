//! Rolling-window key/value cache.
//!
//! Values are bucketed into fixed-width time slots; reads are scoped to a
//! slot range; slots behind the window are evicted in the background.
//!
//! ```no_run
//! use std::time::Duration;
//! use window::{GetOptions, RollingWindow, SetOptions, WindowConfig};
//!
//! # #[tokio::main] async fn main() -> Result<(), window::WindowError> {
//! let cfg = WindowConfig::default().with_slots(6, Duration::from_secs(1));
//! let w: RollingWindow<&str, u32> = RollingWindow::new(cfg)?;
//!
//! w.set("k", 20, SetOptions::default())?;
//! assert_eq!(w.get("k", GetOptions::current_window()), Some(20));
//!
//! w.close().await;
//! # Ok(()) }
//! ```

pub mod config;
mod drain;
pub mod error;
pub mod options;
pub mod position;
pub mod rolling_window;
pub mod slot;

pub use config::WindowConfig;
pub use error::WindowError;
pub use options::{GetOptions, SetOptions};
pub use position::{RelativePosition, WindowBounds, WindowPosition};
pub use rolling_window::RollingWindow;
pub use slot::Slot;
