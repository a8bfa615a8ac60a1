//! Logging setup for the season gauge.
//!
//! The gauge runs once per cron tick, so logs go to stderr and stdout stays
//! free. Colors are only used when stderr is a terminal; cron mail and CI
//! logs get plain text.
//!
//! # Noise Filtering
//!
//! reqwest (rustls backend) pulls in hyper, hyper-util, hyper-rustls, h2 and
//! rustls, which all log connection churn at debug level. Those targets are
//! pinned to `warn`. `RUST_LOG` overrides everything.

use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Targets of the HTTP client stack, filtered to warn level.
pub const NOISY_MODULES: &[&str] = &[
    "reqwest",
    "hyper",
    "hyper_util",
    "hyper_rustls",
    "h2",
    "rustls",
];

fn filter_directives(log_level: &str) -> String {
    std::iter::once(log_level.to_string())
        .chain(NOISY_MODULES.iter().map(|m| format!("{m}=warn")))
        .collect::<Vec<_>>()
        .join(",")
}

fn use_ansi(log_format: &str, stderr_is_terminal: bool) -> bool {
    log_format != "json" && stderr_is_terminal
}

/// Initialize logging to stderr.
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for one JSON object per line, anything else for
///   compact text
///
/// JSON output also emits a close event for each span, which carries the
/// `season_run` duration. Safe to call more than once; later calls are no-ops.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(log_level)));

    let ansi = use_ansi(log_format, std::io::stderr().is_terminal());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi);
    let fmt_layer = if log_format == "json" {
        fmt_layer
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        fmt_layer.compact().with_target(false).boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::debug!(log_level, log_format, ansi, "Logging initialized");
}

/// Generate an id that tags every log line of one scheduled run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
