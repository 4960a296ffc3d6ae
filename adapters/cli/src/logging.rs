//! Diagnostic tracing for the command-line adapter.
//!
//! Program output and run summaries go to stdout; everything emitted through
//! `tracing` goes to stderr and is filtered by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn` when it is unset or invalid.
///
/// ```bash
/// RUST_LOG=maze_lab_system_execution=trace maze-lab run solver.py
/// ```
pub(crate) fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
