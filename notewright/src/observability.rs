//! Tracing init.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing. Call at process startup.
/// When NOTEWRIGHT_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let quiet = std::env::var("NOTEWRIGHT_QUIET")
        .map(|v| v == "1")
        .unwrap_or(false);
    let level = if quiet {
        "notewright=warn".to_string()
    } else {
        std::env::var("NOTEWRIGHT_LOG_LEVEL").unwrap_or_else(|_| "notewright=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
