//! Human-readable renderings of durations and timestamps for display.

use chrono::{Local, TimeZone};

/// Milliseconds as `1h 5m`, `3m 20s` or `45s`
pub fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Epoch milliseconds as a local calendar date, e.g. `Mar 4, 2025`
pub fn format_date(epoch_ms: i64) -> String {
    format_date_in(epoch_ms, &Local)
}

pub fn format_date_in<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt.format("%b %-d, %Y").to_string(),
        None => "-".to_string(),
    }
}
