//! Tracing subscriber setup.

use std::sync::atomic::{AtomicBool, Ordering};

use termbridge_core::{Error, Result};
use tracing_subscriber::EnvFilter;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `level` when the variable is unset or invalid.
///
/// Returns `Ok(false)` when a subscriber was already installed, by this
/// function or anyone else.
pub fn init_logging(level: &str) -> Result<bool> {
    if INSTALLED.load(Ordering::SeqCst) {
        return Ok(false);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("invalid log level '{level}': {e}")))?,
    };
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("Logging initialised");
    }
    Ok(installed)
}
