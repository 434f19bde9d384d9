pub mod cli;

use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use cli::Cli;
use common::logger::init_logger;
use window::RollingWindow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // window diagnostics are gated by the config's verbose flag
    init_logger("window-demo", "info,window=debug");

    let cfg = cli.window_config();
    info!(?cfg, "starting rolling window demo");

    let window: RollingWindow<String, u64> = RollingWindow::new(cfg)?;
    let set_opts = cli.set_options();

    let mut ticker = interval(cli.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    for tick in 0..u64::from(cli.ticks) {
        ticker.tick().await;

        let mut accepted = 0usize;
        for k in 0..cli.keys {
            if window.set(format!("key-{k}"), tick, set_opts)? {
                accepted += 1;
            }
        }

        let sample = window.get("key-0", cli.get_options());
        let bounds = window.window_bounds();

        info!(
            tick,
            accepted,
            size = window.size(),
            slots = window.slot_count(),
            window_left = bounds.left,
            window_right = bounds.right,
            sample = ?sample,
            "tick"
        );
    }

    window.close().await;
    info!(size = window.size(), "demo finished");

    Ok(())
}
