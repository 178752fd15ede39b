use std::time::Instant;

use futures::StreamExt;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{describe_transport_error, percent_complete, throughput_mbps, ProgressUpdate};
use crate::error::{EngineError, Result};

/// Measures one download by reading the response body incrementally,
/// emitting a live throughput estimate as bytes arrive.
pub struct StreamingDownloadMeter {
    url: String,
}

impl StreamingDownloadMeter {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Runs the download, sending a [`ProgressUpdate`] per received chunk.
    /// Returns the final average throughput in Mbps.
    pub async fn run(
        &self,
        client: &Client,
        cancel: &CancellationToken,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Result<f64> {
        let response = client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| EngineError::Download(describe_transport_error(&e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Download(format!("HTTP {}", response.status())));
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let start = Instant::now();
        let mut received: u64 = 0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(url = %self.url, received, "download aborted");
                    return Err(EngineError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| EngineError::Download(describe_transport_error(&e)))?;

            received += chunk.len() as u64;
            let elapsed = start.elapsed();
            let _ = progress_tx
                .send(ProgressUpdate {
                    bytes_transferred: received,
                    total_bytes: total,
                    elapsed,
                    throughput_mbps: throughput_mbps(received, elapsed),
                    percent: total.map(|t| percent_complete(received, t)),
                })
                .await;
        }

        let elapsed = start.elapsed();
        let final_mbps = throughput_mbps(received, elapsed);
        let _ = progress_tx
            .send(ProgressUpdate {
                bytes_transferred: received,
                total_bytes: total,
                elapsed,
                throughput_mbps: final_mbps,
                percent: Some(100),
            })
            .await;

        debug!(url = %self.url, received, mbps = final_mbps, "download complete");
        Ok(final_mbps)
    }
}
