use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global `fmt` subscriber once per process.
///
/// The filter comes from `RUST_LOG` and falls back to `default_filter`
/// (e.g. `"info"`, or `"window=debug"` to see verbose window diagnostics).
/// Later calls are no-ops, so binaries and tests may call this freely.
pub fn init_logger(service_name: &'static str, default_filter: &str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // try_init: a test harness may already own the global subscriber
        let installed = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .is_ok();

        tracing::info!(service = service_name, installed, "logger initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logger("common-tests", "warn");
        init_logger("common-tests", "trace");
        assert!(LOGGER_INIT.get().is_some());
    }
}
