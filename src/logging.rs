//! Tracing setup for the `pulse` binary.
//!
//! Diagnostics go to stderr so stdout stays reserved for command output.
//! The filter comes from `PULSE_LOG` (standard `EnvFilter` syntax), falling
//! back to `warn`, or `debug` with `--verbose`.

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "PULSE_LOG";

pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    // try_init: tests may install a subscriber first
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_filter(filter),
        )
        .try_init();
}
