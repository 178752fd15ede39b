use std::time::Instant;

use rand::Rng;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{describe_transport_error, throughput_mbps};
use crate::error::{EngineError, Result};

/// Measures aggregate throughput with K simultaneous downloads of the same
/// URL, each cache-busted with a unique query parameter.
///
/// One timer spans from just before the first request to the completion of
/// the last; the result is total bits over that wall time. Parallel streams
/// work around per-connection overhead that would understate capacity on a
/// single stream.
pub struct ConcurrentDownloadMeter {
    url: String,
    concurrency: usize,
}

impl ConcurrentDownloadMeter {
    pub fn new(url: impl Into<String>, concurrency: usize) -> Self {
        Self {
            url: url.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Runs all streams to completion and returns the aggregate Mbps.
    ///
    /// All-or-nothing: if any stream fails, the whole measurement fails,
    /// since a partial sum over the full wall time would contaminate the
    /// estimate. Remaining streams are aborted on the first failure.
    pub async fn run(&self, client: &Client, cancel: &CancellationToken) -> Result<f64> {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for _ in 0..self.concurrency {
            let url = cache_busted(&self.url);
            let client = client.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(EngineError::Cancelled),
                    res = fetch_fully(&client, &url) => res,
                }
            });
        }

        // Each task reports only its own byte count; the sum happens here,
        // in one place. Completion order does not matter.
        let mut total_bytes: u64 = 0;
        while let Some(joined) = tasks.join_next().await {
            let bytes =
                joined.map_err(|e| EngineError::Download(format!("download task failed: {e}")))??;
            total_bytes += bytes;
        }

        let elapsed = start.elapsed();
        let mbps = throughput_mbps(total_bytes, elapsed);
        debug!(
            streams = self.concurrency,
            total_bytes,
            elapsed_s = elapsed.as_secs_f64(),
            mbps,
            "concurrent download complete"
        );
        Ok(mbps)
    }
}

async fn fetch_fully(client: &Client, url: &str) -> Result<u64> {
    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-store")
        .send()
        .await
        .map_err(|e| EngineError::Download(describe_transport_error(&e)))?;

    if !response.status().is_success() {
        return Err(EngineError::Download(format!("HTTP {}", response.status())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| EngineError::Download(describe_transport_error(&e)))?;
    Ok(body.len() as u64)
}

/// Appends a unique query parameter so intermediaries cannot serve a cached
/// copy; every stream must measure a fresh transfer.
fn cache_busted(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    let nonce: u64 = rand::thread_rng().gen();
    format!("{url}{sep}nocache={nonce:016x}")
}
