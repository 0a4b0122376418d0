//! Transfer Logging
//!
//! Shared `tracing` setup for binaries. `RUST_LOG` always wins; otherwise the
//! relay crates log at debug and everything else at info.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,transfer=debug";

/// Filter used with `--verbose`
pub const VERBOSE_FILTER: &str = "debug";

/// Filter directives for the given verbosity
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
