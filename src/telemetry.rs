//! Tracing setup for the binary.
//!
//! Events go to stderr, filtered by `RUST_LOG`. The TUI owns the terminal, so
//! it starts with logging off unless `RUST_LOG` asks for it explicitly.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Returns `false` if one was already set.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
