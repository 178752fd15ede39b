use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{describe_transport_error, percent_complete, throughput_mbps, ProgressUpdate};
use crate::error::{EngineError, Result};

const UPLOAD_BLOCK_SIZE: usize = 64 * 1024;

/// Request body that hands the payload to the transport in fixed blocks and
/// reports the cumulative byte count as each block is pulled.
///
/// The count tracks bytes handed to the transport, not bytes acknowledged by
/// the server; the final throughput figure uses the full round trip instead.
struct PayloadStream {
    data: Bytes,
    offset: usize,
    progress_tx: mpsc::UnboundedSender<u64>,
}

impl Stream for PayloadStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.offset == self.data.len() {
            return Poll::Ready(None);
        }
        let end = (self.offset + UPLOAD_BLOCK_SIZE).min(self.data.len());
        let block = self.data.slice(self.offset..end);
        self.offset = end;
        let _ = self.progress_tx.send(self.offset as u64);
        Poll::Ready(Some(Ok(block)))
    }
}

/// Measures upload throughput by POSTing a payload while observing
/// byte-level send progress.
pub struct UploadMeter {
    url: String,
    payload: Bytes,
}

impl UploadMeter {
    pub fn new(url: impl Into<String>, payload: Bytes) -> Self {
        Self {
            url: url.into(),
            payload,
        }
    }

    /// Sends the payload, emitting a live estimate per block. On a 2xx
    /// response the speed is finalized from the total size and total elapsed
    /// time, which is more accurate than the last progress tick (that tick
    /// precedes the server's acknowledgment).
    pub async fn run(
        &self,
        client: &Client,
        cancel: &CancellationToken,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Result<f64> {
        let total = self.payload.len() as u64;
        let (byte_tx, mut byte_rx) = mpsc::unbounded_channel();
        let body = PayloadStream {
            data: self.payload.clone(),
            offset: 0,
            progress_tx: byte_tx,
        };

        let start = Instant::now();
        let request = client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(body))
            .send();
        tokio::pin!(request);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(url = %self.url, "upload aborted");
                    return Err(EngineError::Cancelled);
                }
                Some(sent) = byte_rx.recv() => {
                    let elapsed = start.elapsed();
                    let _ = progress_tx
                        .send(ProgressUpdate {
                            bytes_transferred: sent,
                            total_bytes: Some(total),
                            elapsed,
                            throughput_mbps: throughput_mbps(sent, elapsed),
                            percent: Some(percent_complete(sent, total)),
                        })
                        .await;
                }
                res = &mut request => {
                    let response =
                        res.map_err(|e| EngineError::Upload(describe_transport_error(&e)))?;
                    if !response.status().is_success() {
                        return Err(EngineError::Upload(format!("HTTP {}", response.status())));
                    }

                    let elapsed = start.elapsed();
                    let final_mbps = throughput_mbps(total, elapsed);
                    let _ = progress_tx
                        .send(ProgressUpdate {
                            bytes_transferred: total,
                            total_bytes: Some(total),
                            elapsed,
                            throughput_mbps: final_mbps,
                            percent: Some(100),
                        })
                        .await;
                    debug!(url = %self.url, total, mbps = final_mbps, "upload complete");
                    return Ok(final_mbps);
                }
            }
        }
    }
}
