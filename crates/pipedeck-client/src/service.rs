//! Pipeline client trait, the only contract the engine depends on.
//!
//! Concrete REST transports and the recording mock both implement it.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{Job, JobId, ListRunsOpts, Repository, Run, RunId, Workflow};

/// Remote CI/CD pipeline service.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// List workflow definitions of `repo`.
    async fn list_workflows(&self, repo: &Repository) -> Result<Vec<Workflow>, TransportError>;

    /// List runs, optionally narrowed by `opts`.
    async fn list_runs(
        &self,
        repo: &Repository,
        opts: &ListRunsOpts,
    ) -> Result<Vec<Run>, TransportError>;

    /// List the jobs of a run.
    async fn list_jobs(&self, repo: &Repository, run_id: RunId)
        -> Result<Vec<Job>, TransportError>;

    /// Raw log text of a job.
    async fn get_job_logs(&self, repo: &Repository, job_id: JobId)
        -> Result<String, TransportError>;

    async fn cancel_run(&self, repo: &Repository, run_id: RunId) -> Result<(), TransportError>;

    async fn rerun_workflow(&self, repo: &Repository, run_id: RunId)
        -> Result<(), TransportError>;

    async fn rerun_failed_jobs(
        &self,
        repo: &Repository,
        run_id: RunId,
    ) -> Result<(), TransportError>;

    /// Dispatch `file` on `git_ref` with workflow inputs.
    async fn trigger_workflow(
        &self,
        repo: &Repository,
        file: &str,
        git_ref: &str,
        inputs: &HashMap<String, String>,
    ) -> Result<(), TransportError>;

    /// Remaining request budget last reported by the service.
    fn rate_limit_remaining(&self) -> u64;
}
