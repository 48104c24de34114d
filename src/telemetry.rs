//! Tracing initialisation for the `gatevisor` binary.
//!
//! Library users install their own subscriber; [`LogWriter`](crate::LogWriter)
//! only emits `tracing` events.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. With `json` every line is a JSON
/// object. Calling it again is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
            .try_init()
            .ok();
    }
}
