//! Structured logging setup using `tracing-subscriber`.
//!
//! Human readable output goes to stderr so stdout stays reserved for
//! command results. Verbosity follows `RUST_LOG` (default: `info`).

use tracing_subscriber::EnvFilter;

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
