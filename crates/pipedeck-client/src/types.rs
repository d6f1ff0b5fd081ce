//! Transport-agnostic pipeline types.
//!
//! The domain model the synchronization engine works with, decoupled from
//! any REST payload shape.

use std::fmt;

use chrono::{DateTime, Utc};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Opaque identifier of a workflow definition.
    WorkflowId
);
entity_id!(
    /// Opaque identifier of a single workflow run.
    RunId
);
entity_id!(
    /// Opaque identifier of a job inside a run.
    JobId
);

/// Repository the dashboard is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Execution status shared by runs, jobs and steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Queued,
    InProgress,
    Waiting,
    Completed,
    Unknown,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the service's status label. Unrecognized labels map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "waiting" => Self::Waiting,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    /// Queued or in progress.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a completed run, job or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    Neutral,
    Unknown,
}

impl Conclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::Neutral => "neutral",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "cancelled" => Self::Cancelled,
            "skipped" => Self::Skipped,
            "timed_out" => Self::TimedOut,
            "neutral" => Self::Neutral,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    /// Definition path, e.g. `.github/workflows/ci.yml`.
    pub path: String,
    /// `active` or `disabled`.
    pub state: String,
}

const WORKFLOW_DIR_PREFIX: &str = ".github/workflows/";

impl Workflow {
    /// File name used when dispatching the workflow (`ci.yml`).
    pub fn file_name(&self) -> &str {
        self.path
            .strip_prefix(WORKFLOW_DIR_PREFIX)
            .filter(|rest| !rest.is_empty())
            .unwrap_or(&self.path)
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub name: String,
    pub status: Status,
    pub conclusion: Option<Conclusion>,
    pub branch: String,
    /// Trigger event: `push`, `pull_request`, `workflow_dispatch`, ...
    pub event: String,
    pub created_at: DateTime<Utc>,
    pub actor: String,
    pub url: String,
}

impl Run {
    pub fn is_running(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_failed(&self) -> bool {
        self.conclusion == Some(Conclusion::Failure)
    }
}

/// One unit of work within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: Status,
    pub conclusion: Option<Conclusion>,
    pub steps: Vec<Step>,
}

impl Job {
    pub fn is_running(&self) -> bool {
        self.status.is_active()
    }
}

/// A named command inside a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub status: Status,
    pub conclusion: Option<Conclusion>,
    pub number: u32,
}

impl Step {
    pub fn is_failed(&self) -> bool {
        self.conclusion == Some(Conclusion::Failure)
    }
}

/// Filters for listing runs. Empty strings mean "no filter"; `per_page == 0`
/// leaves page sizing to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRunsOpts {
    pub workflow_id: Option<WorkflowId>,
    pub branch: String,
    pub status: String,
    pub event: String,
    pub per_page: u32,
}

impl ListRunsOpts {
    pub fn for_workflow(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id: Some(workflow_id),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn workflow_file_name_strips_definition_dir() {
        let wf = Workflow {
            id: WorkflowId(1),
            name: "CI".into(),
            path: ".github/workflows/ci.yml".into(),
            state: "active".into(),
        };
        assert_eq!(wf.file_name(), "ci.yml");

        let bare = Workflow {
            path: "deploy.yml".into(),
            ..wf.clone()
        };
        assert_eq!(bare.file_name(), "deploy.yml");

        let dir_only = Workflow {
            path: ".github/workflows/".into(),
            ..wf
        };
        assert_eq!(dir_only.file_name(), ".github/workflows/");
    }

    #[test]
    fn status_parse_round_trip() {
        for status in [
            Status::Queued,
            Status::InProgress,
            Status::Waiting,
            Status::Completed,
        ] {
            assert_eq!(Status::parse(status.as_str()), status);
        }
        assert_eq!(Status::parse("requested"), Status::Unknown);
        assert!(Status::Queued.is_active());
        assert!(!Status::Completed.is_active());
    }

    #[test]
    fn repository_full_name() {
        let repo = Repository::new("octo", "deck");
        assert_eq!(repo.full_name(), "octo/deck");
        assert_eq!(repo.to_string(), "octo/deck");
    }

    #[test]
    fn ids_display_as_bare_numbers() {
        assert_eq!(JobId(1001).to_string(), "1001");
        assert_eq!(RunId::from(7).get(), 7);
    }
}
