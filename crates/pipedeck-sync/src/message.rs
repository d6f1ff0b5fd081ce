//! Inbound messages routed through [`Model::update`](crate::model::Model::update).
//!
//! Background completions carry the key they were issued for so the
//! reconciler can drop results for entities that are no longer selected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pipedeck_client::{ClassifiedError, Job, JobId, Run, RunId, Workflow, WorkflowId};

/// Outcome of a background fetch or action.
pub type Outcome<T> = Result<T, ClassifiedError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    WorkflowsLoaded(Outcome<Vec<Workflow>>),
    RunsLoaded {
        workflow_id: WorkflowId,
        result: Outcome<Vec<Run>>,
    },
    JobsLoaded {
        run_id: RunId,
        result: Outcome<Vec<Job>>,
    },
    LogsLoaded {
        job_id: JobId,
        result: Outcome<String>,
    },
    RunCancelled {
        run_id: RunId,
        result: Outcome<()>,
    },
    RunRerun {
        run_id: RunId,
        result: Outcome<()>,
    },
    RerunFailedJobs {
        run_id: RunId,
        result: Outcome<()>,
    },
    WorkflowTriggered {
        /// Workflow file the dispatch was requested for.
        workflow: String,
        result: Outcome<()>,
    },
    Flash {
        message: String,
        duration: Duration,
    },
    FlashClear,
    Tick {
        at: DateTime<Utc>,
    },
    Intent(Intent),
}

impl Msg {
    /// Short name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkflowsLoaded(_) => "workflows_loaded",
            Self::RunsLoaded { .. } => "runs_loaded",
            Self::JobsLoaded { .. } => "jobs_loaded",
            Self::LogsLoaded { .. } => "logs_loaded",
            Self::RunCancelled { .. } => "run_cancelled",
            Self::RunRerun { .. } => "run_rerun",
            Self::RerunFailedJobs { .. } => "rerun_failed_jobs",
            Self::WorkflowTriggered { .. } => "workflow_triggered",
            Self::Flash { .. } => "flash",
            Self::FlashClear => "flash_clear",
            Self::Tick { .. } => "tick",
            Self::Intent(_) => "intent",
        }
    }
}

impl From<Intent> for Msg {
    fn from(intent: Intent) -> Self {
        Self::Intent(intent)
    }
}

/// A decoded user intent. Key and mouse decoding live with the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    FocusNext,
    FocusPrevious,
    /// Move the cursor of the focused pane.
    SelectNext,
    SelectPrevious,
    /// Filter the focused pane.
    ApplyFilter(String),
    ClearFilter,
    /// Move the log step cursor.
    StepNext,
    StepPrevious,
    Refresh,
    DismissError,
    /// Ask for confirmation before cancelling the selected run.
    CancelRun,
    Confirm,
    Deny,
    RerunRun,
    RerunFailedJobs,
    TriggerWorkflow,
}
