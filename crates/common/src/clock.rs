//! Timestamp utilities for record bookkeeping.
//!
//! Records carry Unix epoch milliseconds so they serialize as plain
//! integers and compare cheaply when sorting project listings.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Milliseconds since the Unix epoch, as stored on records.
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    Utc::now().timestamp_millis()
}

/// Convert stored epoch milliseconds into a UTC datetime.
///
/// Out-of-range values collapse to the epoch itself.
pub fn to_datetime(ms: EpochMillis) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

/// Human-readable local time for CLI listings.
pub fn format_local(ms: EpochMillis) -> String {
    to_datetime(ms)
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// RFC 3339 rendering, used in JSON-ish output.
pub fn format_rfc3339(ms: EpochMillis) -> String {
    to_datetime(ms).to_rfc3339()
}
