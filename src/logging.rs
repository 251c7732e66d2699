use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `SURF_LOG=debug`.
pub const LOG_ENV: &str = "SURF_LOG";

const DEFAULT_FILTER: &str = "info";

/// Filter from `SURF_LOG`, or `info` when unset or unparseable.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Route `tracing` output to stderr so stdout carries only the result.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .try_init();
}
