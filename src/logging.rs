//! Diagnostic logging.
//!
//! Library code emits `tracing` events; this installs the subscriber for the
//! binary. Command results are printed to stdout separately and are not
//! affected by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the stderr subscriber.
///
/// Reads `RUST_LOG`, falling back to `default_level` (e.g. `warn`).
///
/// ```bash
/// RUST_LOG=shield=debug shield seal
/// ```
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
