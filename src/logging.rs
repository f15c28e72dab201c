//! Subscriber setup for binaries, demos and test harnesses.
//!
//! The library itself only emits `tracing` events; nothing is printed unless a
//! subscriber is installed.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "volley=info";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default [`DEFAULT_FILTER`]).
///
/// Safe to call more than once, and a no-op if another global subscriber was
/// already set.
pub fn init() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        if fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already set - keeping it");
        }
    });
}
