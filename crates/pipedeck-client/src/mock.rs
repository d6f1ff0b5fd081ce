//! Mock pipeline client for unit and integration testing.
//!
//! Serves pre-configured data, records every call, and can inject queued
//! failures or per-job response delays.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::TransportError;
use crate::service::PipelineClient;
use crate::types::{
    Job, JobId, ListRunsOpts, Repository, Run, RunId, Status, Workflow, WorkflowId,
};

/// Rate budget reported until a test overrides it.
pub const DEFAULT_MOCK_RATE_LIMIT: u64 = 5000;

/// Client method selector used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockMethod {
    ListWorkflows,
    ListRuns,
    ListJobs,
    GetJobLogs,
    CancelRun,
    RerunWorkflow,
    RerunFailedJobs,
    TriggerWorkflow,
}

/// A recorded call to the mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListWorkflows,
    ListRuns(ListRunsOpts),
    ListJobs(RunId),
    GetJobLogs(JobId),
    CancelRun(RunId),
    RerunWorkflow(RunId),
    RerunFailedJobs(RunId),
    TriggerWorkflow {
        file: String,
        git_ref: String,
        inputs: HashMap<String, String>,
    },
}

impl MockCall {
    pub fn method(&self) -> MockMethod {
        match self {
            Self::ListWorkflows => MockMethod::ListWorkflows,
            Self::ListRuns(_) => MockMethod::ListRuns,
            Self::ListJobs(_) => MockMethod::ListJobs,
            Self::GetJobLogs(_) => MockMethod::GetJobLogs,
            Self::CancelRun(_) => MockMethod::CancelRun,
            Self::RerunWorkflow(_) => MockMethod::RerunWorkflow,
            Self::RerunFailedJobs(_) => MockMethod::RerunFailedJobs,
            Self::TriggerWorkflow { .. } => MockMethod::TriggerWorkflow,
        }
    }
}

/// Mock implementation of `PipelineClient`.
pub struct MockPipelineClient {
    workflows: Mutex<Vec<Workflow>>,
    runs: Mutex<HashMap<WorkflowId, Vec<Run>>>,
    jobs: Mutex<HashMap<RunId, Vec<Job>>>,
    logs: Mutex<HashMap<JobId, String>>,
    log_delays: Mutex<HashMap<JobId, Duration>>,
    failures: Mutex<HashMap<MockMethod, VecDeque<TransportError>>>,
    calls: Mutex<Vec<MockCall>>,
    rate_limit: AtomicU64,
}

impl Default for MockPipelineClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockPipelineClient {
    pub fn new() -> Self {
        Self {
            workflows: Mutex::new(Vec::new()),
            runs: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            logs: Mutex::new(HashMap::new()),
            log_delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            rate_limit: AtomicU64::new(DEFAULT_MOCK_RATE_LIMIT),
        }
    }

    pub fn with_workflows(self, workflows: Vec<Workflow>) -> Self {
        *lock(&self.workflows) = workflows;
        self
    }

    pub fn with_runs(self, workflow_id: WorkflowId, runs: Vec<Run>) -> Self {
        lock(&self.runs).insert(workflow_id, runs);
        self
    }

    pub fn with_jobs(self, run_id: RunId, jobs: Vec<Job>) -> Self {
        lock(&self.jobs).insert(run_id, jobs);
        self
    }

    pub fn with_logs(self, job_id: JobId, logs: impl Into<String>) -> Self {
        self.set_logs(job_id, logs);
        self
    }

    /// Delay every `get_job_logs` answer for `job_id`.
    pub fn with_log_delay(self, job_id: JobId, delay: Duration) -> Self {
        lock(&self.log_delays).insert(job_id, delay);
        self
    }

    /// Queue failures returned (in order) by the next calls to `method`.
    pub fn with_failures(self, method: MockMethod, failures: Vec<TransportError>) -> Self {
        lock(&self.failures)
            .entry(method)
            .or_default()
            .extend(failures);
        self
    }

    pub fn with_rate_limit(self, remaining: u64) -> Self {
        self.set_rate_limit(remaining);
        self
    }

    /// Replace logs served for `job_id`, e.g. to simulate a growing tail.
    pub fn set_logs(&self, job_id: JobId, logs: impl Into<String>) {
        lock(&self.logs).insert(job_id, logs.into());
    }

    pub fn set_runs(&self, workflow_id: WorkflowId, runs: Vec<Run>) {
        lock(&self.runs).insert(workflow_id, runs);
    }

    pub fn set_rate_limit(&self, remaining: u64) {
        self.rate_limit.store(remaining, Ordering::SeqCst);
    }

    pub fn push_failure(&self, method: MockMethod, failure: TransportError) {
        lock(&self.failures)
            .entry(method)
            .or_default()
            .push_back(failure);
    }

    /// Return a copy of all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls to `method`.
    pub fn call_count(&self, method: MockMethod) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: MockCall) -> Result<(), TransportError> {
        let method = call.method();
        lock(&self.calls).push(call);
        match lock(&self.failures).get_mut(&method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Workflow with sensible defaults.
pub fn test_workflow(id: u64, name: &str) -> Workflow {
    Workflow {
        id: WorkflowId(id),
        name: name.to_string(),
        path: format!(".github/workflows/{}.yml", name.to_ascii_lowercase()),
        state: "active".to_string(),
    }
}

/// Run with sensible defaults.
pub fn test_run(id: u64, branch: &str, status: Status) -> Run {
    Run {
        id: RunId(id),
        name: format!("run {id}"),
        status,
        conclusion: None,
        branch: branch.to_string(),
        event: "push".to_string(),
        created_at: Utc::now(),
        actor: "octocat".to_string(),
        url: format!("https://ci.example.test/runs/{id}"),
    }
}

/// Job with sensible defaults and no steps.
pub fn test_job(id: u64, name: &str, status: Status) -> Job {
    Job {
        id: JobId(id),
        name: name.to_string(),
        status,
        conclusion: None,
        steps: Vec::new(),
    }
}

#[async_trait]
impl PipelineClient for MockPipelineClient {
    async fn list_workflows(&self, _repo: &Repository) -> Result<Vec<Workflow>, TransportError> {
        self.record(MockCall::ListWorkflows)?;
        Ok(lock(&self.workflows).clone())
    }

    async fn list_runs(
        &self,
        _repo: &Repository,
        opts: &ListRunsOpts,
    ) -> Result<Vec<Run>, TransportError> {
        self.record(MockCall::ListRuns(opts.clone()))?;
        let runs = lock(&self.runs);
        let mut out = match opts.workflow_id {
            Some(id) => runs.get(&id).cloned().unwrap_or_default(),
            None => runs.values().flatten().cloned().collect(),
        };
        if !opts.branch.is_empty() {
            out.retain(|run| run.branch == opts.branch);
        }
        if opts.per_page > 0 {
            out.truncate(opts.per_page as usize);
        }
        Ok(out)
    }

    async fn list_jobs(
        &self,
        _repo: &Repository,
        run_id: RunId,
    ) -> Result<Vec<Job>, TransportError> {
        self.record(MockCall::ListJobs(run_id))?;
        Ok(lock(&self.jobs).get(&run_id).cloned().unwrap_or_default())
    }

    async fn get_job_logs(
        &self,
        _repo: &Repository,
        job_id: JobId,
    ) -> Result<String, TransportError> {
        self.record(MockCall::GetJobLogs(job_id))?;
        let delay = lock(&self.log_delays).get(&job_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.logs)
            .get(&job_id)
            .cloned()
            .ok_or_else(|| TransportError::http(404, format!("no logs for job {job_id}")))
    }

    async fn cancel_run(&self, _repo: &Repository, run_id: RunId) -> Result<(), TransportError> {
        self.record(MockCall::CancelRun(run_id))
    }

    async fn rerun_workflow(
        &self,
        _repo: &Repository,
        run_id: RunId,
    ) -> Result<(), TransportError> {
        self.record(MockCall::RerunWorkflow(run_id))
    }

    async fn rerun_failed_jobs(
        &self,
        _repo: &Repository,
        run_id: RunId,
    ) -> Result<(), TransportError> {
        self.record(MockCall::RerunFailedJobs(run_id))
    }

    async fn trigger_workflow(
        &self,
        _repo: &Repository,
        file: &str,
        git_ref: &str,
        inputs: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        self.record(MockCall::TriggerWorkflow {
            file: file.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        })
    }

    fn rate_limit_remaining(&self) -> u64 {
        self.rate_limit.load(Ordering::SeqCst)
    }
}
