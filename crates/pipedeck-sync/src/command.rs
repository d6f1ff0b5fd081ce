//! Outbound commands returned by the update function.
//!
//! The model never performs I/O. It describes the work it wants as a
//! `Command` and the [`Dispatcher`](crate::dispatch::Dispatcher) runs it.

use std::collections::HashMap;
use std::time::Duration;

use pipedeck_client::{JobId, RunId, WorkflowId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    None,
    Batch(Vec<Command>),
    FetchWorkflows,
    FetchRuns {
        workflow_id: WorkflowId,
    },
    FetchJobs {
        run_id: RunId,
    },
    FetchLogs {
        job_id: JobId,
    },
    CancelRun {
        run_id: RunId,
    },
    RerunWorkflow {
        run_id: RunId,
    },
    RerunFailedJobs {
        run_id: RunId,
    },
    TriggerWorkflow {
        file: String,
        git_ref: String,
        inputs: HashMap<String, String>,
    },
    /// Show `message`, then clear it after `duration`.
    Flash {
        message: String,
        duration: Duration,
    },
    /// Deliver the next `Tick` after the adaptive interval.
    ScheduleTick,
    /// Replace the log poller with one following `job_id`.
    StartLogPolling {
        job_id: JobId,
    },
    StopLogPolling,
}

impl Command {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Combine commands, flattening nested batches and dropping `None`s.
    /// Collapses to `None` or the single remaining command when possible.
    pub fn batch(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut flat = Vec::new();
        for cmd in commands {
            cmd.flatten_into(&mut flat);
        }
        match flat.len() {
            0 => Self::None,
            1 => flat.pop().unwrap_or_default(),
            _ => Self::Batch(flat),
        }
    }

    /// Leaf commands in execution order.
    pub fn into_vec(self) -> Vec<Command> {
        let mut flat = Vec::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(self, out: &mut Vec<Command>) {
        match self {
            Self::None => {}
            Self::Batch(inner) => {
                for cmd in inner {
                    cmd.flatten_into(out);
                }
            }
            other => out.push(other),
        }
    }
}
