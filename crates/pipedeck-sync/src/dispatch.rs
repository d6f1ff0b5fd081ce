//! Runs [`Command`]s against a [`PipelineClient`].
//!
//! Every piece of I/O runs on its own tokio task and reports back by sending
//! a [`Msg`] into the runtime's inbox; tasks never touch model state. Read
//! fetches go through the retry policy, mutating actions run exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipedeck_client::{
    ClassifiedError, JobId, ListRunsOpts, PipelineClient, Repository, RetryPolicy,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::config::SyncConfig;
use crate::message::Msg;
use crate::poller::AdaptivePoller;
use crate::ticker::PeriodicTask;

pub struct Dispatcher<C> {
    client: Arc<C>,
    repo: Repository,
    retry: RetryPolicy,
    poller: AdaptivePoller,
    runs_per_page: u32,
    tx: UnboundedSender<Msg>,
    shutdown: CancellationToken,
    log_poller: Option<PeriodicTask<Msg>>,
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("repo", &self.repo)
            .field("retry", &self.retry)
            .field("poller", &self.poller)
            .field("log_poller", &self.log_poller)
            .finish_non_exhaustive()
    }
}

impl<C: PipelineClient + 'static> Dispatcher<C> {
    pub fn new(
        client: Arc<C>,
        repo: Repository,
        cfg: &SyncConfig,
        tx: UnboundedSender<Msg>,
    ) -> Self {
        let (base, max) = cfg.adaptive_intervals();
        let budget = Arc::clone(&client);
        Self {
            client,
            repo,
            retry: cfg.retry_policy(),
            poller: AdaptivePoller::with_intervals(base, max, move || {
                budget.rate_limit_remaining()
            }),
            runs_per_page: cfg.runs_per_page,
            tx,
            shutdown: CancellationToken::new(),
            log_poller: None,
        }
    }

    pub fn poller(&self) -> &AdaptivePoller {
        &self.poller
    }

    /// Whether a log poller is live.
    pub fn is_log_polling(&self) -> bool {
        self.log_poller.as_ref().is_some_and(|task| !task.is_stopped())
    }

    /// Execute every leaf of `cmd`. Must be called inside a tokio runtime.
    pub fn dispatch(&mut self, cmd: Command) {
        for leaf in cmd.into_vec() {
            self.run(leaf);
        }
    }

    fn run(&mut self, cmd: Command) {
        match cmd {
            Command::None | Command::Batch(_) => {}
            Command::FetchWorkflows => {
                let (client, repo, retry) = self.parts();
                self.spawn(async move {
                    Msg::WorkflowsLoaded(retry.run(|| client.list_workflows(&repo)).await)
                });
            }
            Command::FetchRuns { workflow_id } => {
                let (client, repo, retry) = self.parts();
                let opts = ListRunsOpts {
                    per_page: self.runs_per_page,
                    ..ListRunsOpts::for_workflow(workflow_id)
                };
                self.spawn(async move {
                    let result = retry.run(|| client.list_runs(&repo, &opts)).await;
                    Msg::RunsLoaded {
                        workflow_id,
                        result,
                    }
                });
            }
            Command::FetchJobs { run_id } => {
                let (client, repo, retry) = self.parts();
                self.spawn(async move {
                    let result = retry.run(|| client.list_jobs(&repo, run_id)).await;
                    Msg::JobsLoaded { run_id, result }
                });
            }
            Command::FetchLogs { job_id } => {
                let (client, repo, retry) = self.parts();
                self.spawn(async move {
                    let result = retry.run(|| client.get_job_logs(&repo, job_id)).await;
                    Msg::LogsLoaded { job_id, result }
                });
            }
            Command::CancelRun { run_id } => {
                let (client, repo, _) = self.parts();
                self.spawn(async move {
                    let result = client.cancel_run(&repo, run_id).await;
                    Msg::RunCancelled {
                        run_id,
                        result: result.map_err(ClassifiedError::from),
                    }
                });
            }
            Command::RerunWorkflow { run_id } => {
                let (client, repo, _) = self.parts();
                self.spawn(async move {
                    let result = client.rerun_workflow(&repo, run_id).await;
                    Msg::RunRerun {
                        run_id,
                        result: result.map_err(ClassifiedError::from),
                    }
                });
            }
            Command::RerunFailedJobs { run_id } => {
                let (client, repo, _) = self.parts();
                self.spawn(async move {
                    let result = client.rerun_failed_jobs(&repo, run_id).await;
                    Msg::RerunFailedJobs {
                        run_id,
                        result: result.map_err(ClassifiedError::from),
                    }
                });
            }
            Command::TriggerWorkflow {
                file,
                git_ref,
                inputs,
            } => {
                let (client, repo, _) = self.parts();
                self.spawn(async move {
                    let result = client
                        .trigger_workflow(&repo, &file, &git_ref, &inputs)
                        .await;
                    Msg::WorkflowTriggered {
                        workflow: file,
                        result: result.map_err(ClassifiedError::from),
                    }
                });
            }
            Command::Flash { message, duration } => {
                self.send(Msg::Flash { message, duration });
                self.spawn(async move {
                    tokio::time::sleep(duration).await;
                    Msg::FlashClear
                });
            }
            Command::ScheduleTick => {
                let interval = self.poller.next_interval();
                tracing::debug!(
                    event = "sync.tick.scheduled",
                    interval_ms = interval.as_millis() as u64,
                );
                self.spawn(async move {
                    tokio::time::sleep(interval).await;
                    Msg::Tick { at: Utc::now() }
                });
            }
            Command::StartLogPolling { job_id } => self.start_log_polling(job_id),
            Command::StopLogPolling => self.stop_log_polling(),
        }
    }

    fn parts(&self) -> (Arc<C>, Repository, RetryPolicy) {
        (Arc::clone(&self.client), self.repo.clone(), self.retry)
    }

    fn send(&self, msg: Msg) {
        if self.tx.send(msg).is_err() {
            tracing::debug!(event = "sync.dispatch.inbox_closed");
        }
    }

    /// Run `work` on its own task and deliver its message, unless the
    /// dispatcher shuts down first.
    fn spawn<F>(&self, work: F)
    where
        F: Future + Send + 'static,
        F::Output: Into<Option<Msg>>,
    {
        let tx = self.tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                out = work => out.into(),
            };
            if let Some(msg) = outcome {
                // Receiver gone means the runtime shut down.
                let _ = tx.send(msg);
            }
        });
    }

    /// Replace the current log poller with one following `job_id`. The
    /// cadence is picked from the rate budget at start time.
    fn start_log_polling(&mut self, job_id: JobId) {
        self.stop_log_polling();

        let interval = self.poller.next_interval();
        let client = Arc::clone(&self.client);
        let repo = self.repo.clone();
        let task = PeriodicTask::new(interval, move |token: CancellationToken| {
            let client = Arc::clone(&client);
            let repo = repo.clone();
            async move {
                let result = client.get_job_logs(&repo, job_id).await;
                if token.is_cancelled() {
                    return None;
                }
                Some(Msg::LogsLoaded {
                    job_id,
                    result: result.map_err(ClassifiedError::from),
                })
            }
        });

        tracing::debug!(
            event = "sync.log_poll.started",
            job_id = job_id.get(),
            interval_ms = interval.as_millis() as u64,
        );
        self.spawn(task.start());
        self.log_poller = Some(task);
    }

    /// Interval the next tick or log poll would wait right now.
    pub fn current_interval(&self) -> Duration {
        self.poller.next_interval()
    }
}

// Teardown needs no client bounds so `Drop` can share it.
impl<C> Dispatcher<C> {
    fn stop_log_polling(&mut self) {
        if let Some(task) = self.log_poller.take() {
            task.stop();
            tracing::debug!(event = "sync.log_poll.stopped");
        }
    }

    /// Stop the log poller and abandon every in-flight task.
    pub fn shutdown(&mut self) {
        self.stop_log_polling();
        self.shutdown.cancel();
    }
}

impl<C> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
