use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{DownloadMode, TestConfig};
use crate::error::{EngineError, Result};
use crate::meter::concurrent::ConcurrentDownloadMeter;
use crate::meter::download::StreamingDownloadMeter;
use crate::meter::upload::UploadMeter;
use crate::meter::ProgressUpdate;
use crate::payload::synthetic_payload;
use crate::probe::EndpointProbe;
use crate::session::{Speed, TestSession, TestStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a full measurement run: probe, concurrent download, settle delay,
/// upload. Owns the [`TestSession`] record; collaborators observe it through
/// [`SpeedTest::subscribe`] and steer it with [`SpeedTest::start`] and
/// [`SpeedTest::cancel`].
pub struct SpeedTest {
    config: TestConfig,
    client: Client,
    session_tx: watch::Sender<TestSession>,
    active: Option<ActiveRun>,
}

impl SpeedTest {
    pub fn new(config: TestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let (session_tx, _) = watch::channel(TestSession::default());
        Ok(Self {
            config,
            client,
            session_tx,
            active: None,
        })
    }

    /// Read-only stream of session snapshots, one per state change.
    pub fn subscribe(&self) -> watch::Receiver<TestSession> {
        self.session_tx.subscribe()
    }

    /// Current session snapshot.
    pub fn session(&self) -> TestSession {
        self.session_tx.borrow().clone()
    }

    /// Starts a run. At most one run is active at a time: a run still in
    /// flight is cancelled and awaited before the session is reset.
    pub async fn start(&mut self) {
        self.cancel_active().await;

        let cancel = CancellationToken::new();
        let runner = TestRunner {
            config: self.config.clone(),
            client: self.client.clone(),
            session_tx: self.session_tx.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(runner.run());
        self.active = Some(ActiveRun { cancel, handle });
    }

    /// Requests cancellation of the active run. Idempotent; cancelling a
    /// finished or never-started run does nothing.
    pub fn cancel(&mut self) {
        if self.session_tx.borrow().status.is_terminal() {
            return;
        }
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }

    async fn cancel_active(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
            let _ = run.handle.await;
        }
    }
}

/// One run's worth of state, moved onto the run task. All session mutation
/// funnels through [`TestRunner::update`]; the meters only report back via
/// channels and return values.
struct TestRunner {
    config: TestConfig,
    client: Client,
    session_tx: watch::Sender<TestSession>,
    cancel: CancellationToken,
}

impl TestRunner {
    fn update(&self, mutate: impl FnOnce(&mut TestSession)) {
        self.session_tx.send_modify(mutate);
    }

    async fn run(self) {
        self.update(|s| s.reset());

        match self.run_phases().await {
            Ok(()) => self.update(|s| {
                s.status = TestStatus::Completed;
                s.status_message = "Done".to_string();
            }),
            Err(EngineError::Cancelled) => self.update(|s| {
                s.status = TestStatus::Cancelled;
                s.cancellation_requested = true;
                s.status_message = "Test cancelled".to_string();
            }),
            Err(err) => self.update(|s| {
                s.status = TestStatus::Failed;
                s.status_message = err.to_string();
            }),
        }
    }

    async fn run_phases(&self) -> Result<()> {
        self.update(|s| {
            s.status = TestStatus::ProbingEndpoint;
            s.status_message = "Probing download endpoints...".to_string();
        });
        let probe = EndpointProbe::new(self.config.secure_context);
        let endpoint = tokio::select! {
            _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
            res = probe.select(
                &self.client,
                &self.config.download_candidates,
                self.config.fallback_download_url.as_deref(),
            ) => res?,
        };
        info!(%endpoint, "selected download endpoint");

        self.update(|s| {
            s.status = TestStatus::Downloading;
            s.status_message = "Testing download...".to_string();
        });
        match self.run_download(&endpoint).await {
            Ok(mbps) => self.update(|s| {
                s.download_mbps = Some(Speed::Mbps(mbps));
                s.download_progress = Some(100);
            }),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            // A failed download does not fail the run; the sentinel is
            // recorded and the upload still gets its measurement.
            Err(err) => {
                warn!(%err, "download phase failed");
                self.update(|s| {
                    s.download_mbps = Some(Speed::Error);
                    s.download_progress = None;
                    s.status_message = err.to_string();
                });
            }
        }

        // Cosmetic pacing between phases.
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        self.update(|s| {
            s.status = TestStatus::Uploading;
            s.status_message = "Testing upload...".to_string();
        });
        match self.run_upload().await {
            Ok(mbps) => self.update(|s| {
                s.upload_mbps = Some(Speed::Mbps(mbps));
                s.upload_progress = Some(100);
            }),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                warn!(%err, "upload phase failed");
                self.update(|s| {
                    s.upload_mbps = Some(Speed::Error);
                    s.upload_progress = None;
                    s.status_message = err.to_string();
                });
            }
        }

        Ok(())
    }

    async fn run_download(&self, endpoint: &str) -> Result<f64> {
        match self.config.download_mode {
            DownloadMode::Concurrent => {
                let meter = ConcurrentDownloadMeter::new(endpoint, self.config.concurrency);
                meter.run(&self.client, &self.cancel).await
            }
            DownloadMode::SingleStream => {
                let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressUpdate>(32);
                let meter = StreamingDownloadMeter::new(endpoint);
                let client = self.client.clone();
                let cancel = self.cancel.clone();
                let handle =
                    tokio::spawn(async move { meter.run(&client, &cancel, progress_tx).await });

                while let Some(progress) = progress_rx.recv().await {
                    self.update(|s| {
                        s.download_mbps = Some(Speed::Mbps(progress.throughput_mbps));
                        s.download_progress = progress.percent;
                    });
                }

                handle
                    .await
                    .map_err(|e| EngineError::Download(format!("download task failed: {e}")))?
            }
        }
    }

    async fn run_upload(&self) -> Result<f64> {
        let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressUpdate>(32);
        let payload = synthetic_payload(self.config.upload_size_bytes);
        let meter = UploadMeter::new(self.config.upload_url.clone(), payload);
        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move { meter.run(&client, &cancel, progress_tx).await });

        while let Some(progress) = progress_rx.recv().await {
            self.update(|s| {
                s.upload_mbps = Some(Speed::Mbps(progress.throughput_mbps));
                s.upload_progress = progress.percent;
            });
        }

        handle
            .await
            .map_err(|e| EngineError::Upload(format!("upload task failed: {e}")))?
    }
}
