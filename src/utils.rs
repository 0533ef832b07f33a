//! Timebase helpers

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert nanoseconds to seconds
pub fn ns_to_secs(ns: i64) -> f64 {
    ns as f64 / NANOS_PER_SEC as f64
}

/// Convert seconds to nanoseconds, rounded to the nearest nanosecond
pub fn secs_to_ns(secs: f64) -> i64 {
    (secs * NANOS_PER_SEC as f64).round() as i64
}

/// Format duration in seconds to MM:SS.SS format
pub fn format_duration(duration_secs: f64) -> String {
    let minutes = (duration_secs / 60.0) as u32;
    let seconds = duration_secs % 60.0;
    format!("{:02}:{:05.2}", minutes, seconds)
}
