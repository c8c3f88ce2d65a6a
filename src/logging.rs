//! Logging setup based on `tracing` and `tracing-subscriber`.

use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global subscriber.
///
/// The filter is read from `RUST_LOG` (e.g. `RUST_LOG=usps_box_packer=debug`)
/// and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Verbose logging for tests; safe to call repeatedly.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
