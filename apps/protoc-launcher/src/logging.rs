//! Diagnostic logging setup.
//!
//! Everything is written to stderr; stdout is reserved for protoc.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "PROTOC_LAUNCHER_LOG";

/// Switches output to JSON lines when set.
pub const LOG_JSON_ENV: &str = "PROTOC_LAUNCHER_LOG_JSON";

const DEFAULT_FILTER: &str = "protoc_launcher=info";

/// Initializes the global tracing subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::registry().with(filter);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time();

        subscriber.with(fmt_layer).init();
    }
}
