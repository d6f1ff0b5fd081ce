//! Cancellable periodic probe.
//!
//! A `PeriodicTask` waits one interval, runs its probe, and repeats until the
//! probe yields a value or the task is stopped. Cancellation is cooperative:
//! `stop()` only signals, the loop observes it at its next wait or after the
//! in-flight probe returns.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Boxed future returned by a probe.
pub type ProbeFuture<T> = Pin<Box<dyn Future<Output = Option<T>> + Send>>;

type ProbeFn<T> = Arc<dyn Fn(CancellationToken) -> ProbeFuture<T> + Send + Sync>;

pub struct PeriodicTask<T> {
    cancel: CancellationToken,
    interval: Duration,
    probe: ProbeFn<T>,
}

impl<T> fmt::Debug for PeriodicTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("interval", &self.interval)
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PeriodicTask<T> {
    /// Create a stopped-until-started task. The probe receives the task's
    /// cancellation token so long-running probes can bail out early.
    pub fn new<F, Fut>(interval: Duration, probe: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self {
            cancel: CancellationToken::new(),
            interval,
            probe: Arc::new(move |token: CancellationToken| {
                Box::pin(probe(token)) as ProbeFuture<T>
            }),
        }
    }

    /// The polling loop as a detached unit of work; spawn it to run it.
    ///
    /// Resolves to the first value the probe yields, or `None` once the task
    /// is stopped. A value produced by a probe that was running when `stop()`
    /// was called is dropped.
    pub fn start(&self) -> impl Future<Output = Option<T>> + Send + 'static {
        let cancel = self.cancel.clone();
        let interval = self.interval;
        let probe = Arc::clone(&self.probe);
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(interval) => {}
                }

                let outcome = probe(cancel.clone()).await;
                if cancel.is_cancelled() {
                    return None;
                }
                if outcome.is_some() {
                    return outcome;
                }
            }
        }
    }

    /// Signal cancellation. Safe to call any number of times, before or
    /// after `start()`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counting_task(yield_on: u32) -> (PeriodicTask<u32>, Arc<AtomicU32>) {
        let probes = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&probes);
        let task = PeriodicTask::new(Duration::from_secs(1), move |_token| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { (n >= yield_on).then_some(n) }
        });
        (task, probes)
    }

    #[tokio::test(start_paused = true)]
    async fn yields_first_probe_result_after_interval() {
        let (task, probes) = counting_task(3);
        let started = tokio::time::Instant::now();

        let result = task.start().await;

        assert_eq!(result, Some(3));
        assert_eq!(probes.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_exits_without_probing() {
        let (task, probes) = counting_task(1);
        task.stop();

        assert_eq!(task.start().await, None);
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (task, _) = counting_task(u32::MAX);
        task.stop();
        task.stop();
        task.stop();
        assert!(task.is_stopped());
        assert_eq!(task.start().await, None);
        task.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_waiting_terminates_loop() {
        let (task, probes) = counting_task(u32::MAX);
        let handle = tokio::spawn(task.start());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        task.stop();

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn result_of_in_flight_probe_is_dropped_after_stop() {
        let task = Arc::new(PeriodicTask::new(Duration::from_millis(10), |_token| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Some("late")
        }));
        let handle = tokio::spawn(task.start());

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.stop();

        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_observes_cancellation_token() {
        let task = PeriodicTask::new(Duration::from_millis(10), |token: CancellationToken| async move {
            token.cancelled().await;
            Some(())
        });
        let unit = task.start();
        task.stop();
        assert_eq!(unit.await, None);
    }
}
