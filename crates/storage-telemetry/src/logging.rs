//! `tracing-subscriber` init, grounded on `lnxdrive-cli`'s verbosity-to-filter
//! pattern: a `-v` count picks a default filter, `RUST_LOG` always wins.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. `verbosity` follows the usual
/// `clap` repeated-flag convention: 0 = info, 1 = debug, 2+ = trace.
pub fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
