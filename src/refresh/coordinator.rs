use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::refresh::collector::{read_artifact, Collector, CollectorError, Completion};
use crate::refresh::AttemptResult;
use crate::snapshot::SnapshotStore;
use crate::utils::truncate;

/// Longest stretch of collector stderr that ends up in the log
const STDERR_LOG_LIMIT: usize = 500;

/// Runs the collector at most once at a time and publishes its artifact
///
/// A trigger that arrives while a run is outstanding is dropped, never
/// queued. The store is written only after a successful exit with a
/// non-empty artifact, so failures leave the last good snapshot in place.
pub struct RefreshCoordinator {
    store: Arc<SnapshotStore>,
    collector: Arc<dyn Collector>,
    artifact_path: PathBuf,
    in_progress: AtomicBool,
    last_result: Mutex<AttemptResult>,
}

/// Clears the in-progress flag when the refresh task ends, however it ends
struct InFlight(Arc<RefreshCoordinator>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_progress.store(false, Ordering::Release);
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SnapshotStore>,
        collector: Arc<dyn Collector>,
        artifact_path: PathBuf,
    ) -> Self {
        Self {
            store,
            collector,
            artifact_path,
            in_progress: AtomicBool::new(false),
            last_result: Mutex::new(AttemptResult::Unknown),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn last_result(&self) -> AttemptResult {
        *self.last_result.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a refresh unless one is already running
    ///
    /// # Returns
    /// - `Some(handle)` - A refresh was started; the handle yields its result
    /// - `None` - Another refresh is in progress, nothing was done
    pub fn trigger_refresh(self: &Arc<Self>) -> Option<JoinHandle<AttemptResult>> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Refresh already in progress, skipping trigger");
            return None;
        }

        // created before spawning so the flag is released even if the task
        // is dropped without ever being polled
        let guard = InFlight(self.clone());
        Some(tokio::spawn(async move {
            let this = &guard.0;
            tracing::debug!("Refresh started");

            let started = Instant::now();
            let completion = this.collector.collect().await;
            let result = this.complete(completion, started.elapsed()).await;

            *this.last_result.lock().unwrap_or_else(|e| e.into_inner()) = result;
            result
        }))
    }

    /// Single completion handler for every way a collector run can end
    async fn complete(
        &self,
        completion: Result<Completion, CollectorError>,
        elapsed: Duration,
    ) -> AttemptResult {
        let completion = match completion {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!("Refresh failed after {:?}: {}", elapsed, e);
                return AttemptResult::Failure;
            }
        };

        if !completion.success {
            let code = completion
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            tracing::error!(
                "Collector exited with {} after {:?}: {}",
                code,
                elapsed,
                truncate(&completion.stderr, STDERR_LOG_LIMIT)
            );
            return AttemptResult::Failure;
        }

        if !completion.stderr.trim().is_empty() {
            tracing::debug!(
                "Collector stderr: {}",
                truncate(&completion.stderr, STDERR_LOG_LIMIT)
            );
        }

        match read_artifact(&self.artifact_path).await {
            Ok(content) => {
                let len = content.len();
                self.store.publish(content);
                tracing::info!("Dashboard refreshed in {:?} ({} bytes)", elapsed, len);
                AttemptResult::Success
            }
            Err(e) => {
                tracing::warn!(
                    "Collector succeeded but {}: {}, keeping previous dashboard",
                    self.artifact_path.display(),
                    e
                );
                AttemptResult::Failure
            }
        }
    }

    /// Trigger a refresh now and then every `period` until `shutdown` fires
    ///
    /// Ticks follow the wall clock rather than refresh completion; a tick
    /// that lands on a running refresh is absorbed by the single-flight skip.
    pub fn schedule_periodic(
        self: &Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Refresh scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = this.trigger_refresh();
                    }
                }
            }
        })
    }
}
