//! Fire-and-forget auxiliary work that must never affect the turn.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Runs background jobs with a timeout. Failures are logged, never surfaced.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    token: CancellationToken,
    timeout: Duration,
}

impl BackgroundTasks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            timeout,
        }
    }

    /// Jobs currently running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Spawn `job`. It is dropped on timeout or shutdown.
    pub fn spawn<F, E>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if self.token.is_cancelled() {
            debug!(job = name, "Background tasks shut down; job skipped");
            return;
        }
        let token = self.token.clone();
        let timeout = self.timeout;
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(job = name, "Background job cancelled"),
                outcome = tokio::time::timeout(timeout, job) => match outcome {
                    Ok(Ok(())) => debug!(job = name, "Background job finished"),
                    Ok(Err(e)) => warn!(job = name, error = %e, "Background job failed"),
                    Err(_) => warn!(job = name, timeout_secs = timeout.as_secs(), "Background job timed out"),
                },
            }
        });
    }

    /// Cancel everything still running and wait for it to wind down.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_jobs_to_completion() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn("count", async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        tasks.shutdown().await;
        // Jobs may be cancelled before they start, but none run after shutdown.
        assert!(done.load(Ordering::SeqCst) <= 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_jobs_time_out() {
        let tasks = BackgroundTasks::new(Duration::from_secs(1));
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        tasks.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(tasks.is_empty());
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        tasks.spawn("fails", async { Err::<(), _>("disk full") });
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_after_shutdown_is_ignored() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        tasks.shutdown().await;
        tasks.spawn("late", async { Ok::<(), String>(()) });
        assert!(tasks.is_empty());
    }
}
