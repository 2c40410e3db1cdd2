/// Logging setup shared by the binaries.
///
/// The library only emits `tracing` events; each binary calls
/// `init_logging` once. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to `default_filter`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs the global subscriber. Later calls are ignored, so tests and
/// binaries can both call it.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false);

    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
