use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "DEVPROV_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

pub fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging() {
    let raw = std::env::var(LOG_FILTER_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(raw.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
