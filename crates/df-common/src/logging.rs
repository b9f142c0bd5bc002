//! Structured Logging Configuration
//!
//! - JSON output for production (`LOG_FORMAT=json`)
//! - Human-readable output otherwise
//! - `RUST_LOG` filter, defaulting to `info` (or `debug` in debug mode)
//!
//! ```rust,ignore
//! use df_common::logging::init_logging;
//!
//! init_logging("df-feeder", config.debug_mode);
//! tracing::info!(command_target = %cmd.target, "Dispatching command");
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for the given service.
///
/// `RUST_LOG` always wins over `debug_mode` when set.
pub fn init_logging(service_name: &str, debug_mode: bool) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = build_env_filter(debug_mode);

    if log_format.eq_ignore_ascii_case("json") {
        init_json_logging(env_filter);
    } else {
        init_text_logging(env_filter);
    }

    tracing::debug!(service = service_name, "Logging initialized");
}

fn default_level(debug_mode: bool) -> &'static str {
    if debug_mode {
        "debug"
    } else {
        "info"
    }
}

fn build_env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(debug_mode)))
}

fn init_json_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(false)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();
}

fn init_text_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .init();
}
