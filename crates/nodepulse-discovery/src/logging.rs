use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LogLevel;

/// Build the filter used by [`init`]
///
/// `RUST_LOG` takes precedence; otherwise the configured level applies.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize structured logging
///
/// Installs a global tracing subscriber with either JSON or compact formatting.
/// JSON output suits log ingestion; compact output suits terminals.
///
/// Pools report through `tracing` whether or not this is called; embedders
/// with their own subscriber should skip it.
///
/// # Arguments
///
/// * `level` - Default level when `RUST_LOG` is unset
/// * `json` - Whether to use JSON formatting
///
/// # Examples
///
/// ```no_run
/// use nodepulse_discovery::{LogLevel, logging};
///
/// logging::init(LogLevel::Info, false);
/// ```
pub fn init(level: LogLevel, json: bool) {
    let format: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_current_span(true).with_span_list(false).boxed()
    } else {
        fmt::layer().compact().with_file(false).with_line_number(false).boxed()
    };

    tracing_subscriber::registry().with(format.with_filter(env_filter(level))).init();
}
