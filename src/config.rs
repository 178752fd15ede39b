use std::time::Duration;

use crate::payload::DEFAULT_PAYLOAD_SIZE;

const DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=5242880";
const UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Which download measurement the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// K parallel cache-busted streams, one aggregate figure. The default:
    /// parallel streams saturate the link far better than one connection.
    Concurrent,
    /// One stream read incrementally with live progress. Kept as a
    /// diagnostic mode for inspecting a single endpoint.
    SingleStream,
}

#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Download candidates, probed in order; first reachable one wins.
    pub download_candidates: Vec<String>,
    /// Returned without a reachability check if every candidate fails.
    pub fallback_download_url: Option<String>,
    pub upload_url: String,
    pub upload_size_bytes: usize,
    pub concurrency: usize,
    pub download_mode: DownloadMode,
    /// Whether the caller runs in a secure (https) context. Plain-http
    /// candidates are skipped outright when set, never attempted.
    pub secure_context: bool,
    /// Cosmetic pause between the download and upload phases.
    pub settle_delay: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            download_candidates: vec![DOWNLOAD_URL.to_string()],
            fallback_download_url: Some(DOWNLOAD_URL.to_string()),
            upload_url: UPLOAD_URL.to_string(),
            upload_size_bytes: DEFAULT_PAYLOAD_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            download_mode: DownloadMode::Concurrent,
            secure_context: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}
