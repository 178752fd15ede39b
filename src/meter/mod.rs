pub mod concurrent;
pub mod download;
pub mod upload;

use std::time::Duration;

/// One live progress emission from a meter: `(bytes, total-or-unknown,
/// elapsed)` plus the derived throughput and percent.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
    pub elapsed: Duration,
    pub throughput_mbps: f64,
    /// Rounded percent complete; `None` when the total size is unknown.
    pub percent: Option<u8>,
}

const MEBIBIT: f64 = (1u64 << 20) as f64;

/// Throughput in mebibits per second: bits over elapsed seconds over 2^20.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        // First chunk can land within timer resolution.
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / MEBIBIT
}

pub fn percent_complete(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (transferred as f64 / total as f64 * 100.0).round() as u64;
    pct.min(100) as u8
}

/// Turns a transport-level failure into something a user can act on,
/// since "Failed to fetch"-class errors all look alike otherwise.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_connect() {
        format!("connection failed ({err}); the endpoint may be down or blocked")
    } else if err.is_timeout() {
        format!("timed out ({err})")
    } else {
        err.to_string()
    }
}
