/*!
Logging initialization for the runner.

Readings are the only thing written to stdout, so every log line goes to stderr.
With the `profiling` feature, `profiling` scopes are recorded as tracing spans and
show up through the same subscriber.
*/

/// Default filter used when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        // Release builds default to INFO to avoid excessive logs.
        "info"
    }
}

/// Initialize logging with sensible defaults.
#[cfg(not(target_os = "android"))]
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", default_filter());
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    let registry = tracing_subscriber::registry().with(fmt_layer);
    registry.init();

    if cfg!(feature = "profiling") {
        tracing::info!("Logging initialized (profiling scopes recorded as spans)");
    } else {
        tracing::info!("Logging initialized (profiling disabled in this build)");
    }
}

/// Initialize logging through the Android log buffer.
#[cfg(target_os = "android")]
pub fn setup_logging() {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    android_logger::init_once(android_logger::Config::default().with_max_level(level));
    log::info!("Logging initialized (android)");
}
