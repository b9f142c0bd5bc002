//! Metrics for the dispatch pipeline
//!
//! Recorded through the `metrics` facade; the binary installs the
//! Prometheus recorder.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record one device request, including ones that failed before the HTTP call
pub fn record_device_request(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    counter!("df_device_requests_total", "result" => result).increment(1);
    histogram!("df_device_request_duration_seconds", "result" => result).record(duration.as_secs_f64());
}

/// Record the settled outcome of a delivery
pub fn record_message(disposition: &str, reason: &str) {
    counter!(
        "df_messages_total",
        "disposition" => disposition.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record child commands emitted by a wildcard fan-out
pub fn record_fanout(org: &str, children: usize) {
    counter!("df_fanout_commands_total", "org" => org.to_string()).increment(children as u64);
}
