use std::fmt;

/// Where a test run currently is in its lifecycle.
///
/// Transitions only move forward (`Idle` through `Completed`), except that
/// `Cancelled` and `Failed` are reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestStatus {
    #[default]
    Idle,
    ProbingEndpoint,
    Downloading,
    Uploading,
    Completed,
    Cancelled,
    Failed,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestStatus::Completed | TestStatus::Cancelled | TestStatus::Failed
        )
    }
}

/// A measured throughput figure, or the error sentinel for a failed phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Speed {
    Mbps(f64),
    Error,
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speed::Mbps(v) => write!(f, "{v:.2}"),
            Speed::Error => write!(f, "Error"),
        }
    }
}

/// The single shared record for one test run.
///
/// Owned by the orchestrator; collaborators only ever see read-only snapshots
/// of it. Progress percentages stay `None` when the total size is unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSession {
    pub status: TestStatus,
    pub download_mbps: Option<Speed>,
    pub upload_mbps: Option<Speed>,
    pub download_progress: Option<u8>,
    pub upload_progress: Option<u8>,
    pub status_message: String,
    pub cancellation_requested: bool,
}

impl TestSession {
    /// Clears every field back to the idle state. Called before any
    /// measurement of a new run begins so nothing leaks across runs.
    pub fn reset(&mut self) {
        *self = TestSession::default();
    }

    /// One-line summary suitable for copying: `Download: X Mbps, Upload: Y Mbps`.
    pub fn format_result(&self) -> String {
        fn speed(v: Option<Speed>) -> String {
            v.map_or_else(|| "-".to_string(), |s| s.to_string())
        }
        format!(
            "Download: {} Mbps, Upload: {} Mbps",
            speed(self.download_mbps),
            speed(self.upload_mbps)
        )
    }
}
