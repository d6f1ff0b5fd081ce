//! Dashboard state and the result reconciler.
//!
//! `Model::update` is the only place engine state changes. Background work
//! reports back through [`Msg`]; every keyed completion is checked against
//! the current selection first and dropped when it no longer matches, so a
//! late result for job A can never replace what is shown for job B.
//!
//! Two completions for the same still-selected key are applied in delivery
//! order; the last one delivered wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pipedeck_client::{ClassifiedError, Job, JobId, Run, RunId, Workflow, WorkflowId};

use crate::command::Command;
use crate::config::SyncConfig;
use crate::filtered_list::{contains_ignore_case, FilteredList};
use crate::log_parser::{parse_logs, ParsedLogs};
use crate::message::{Intent, Msg, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Workflows,
    Runs,
    Jobs,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::Workflows => Self::Runs,
            Self::Runs | Self::Jobs => Self::Jobs,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Jobs => Self::Runs,
            Self::Runs | Self::Workflows => Self::Workflows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LogState {
    #[default]
    Empty,
    Loading,
    Loaded(ParsedLogs),
    Failed(ClassifiedError),
}

/// Logs of the selected job plus the step cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogPane {
    job_id: Option<JobId>,
    state: LogState,
    /// `None` shows every step.
    step: Option<usize>,
}

impl LogPane {
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn state(&self) -> &LogState {
        &self.state
    }

    pub fn selected_step(&self) -> Option<usize> {
        self.step
    }

    pub fn parsed(&self) -> Option<&ParsedLogs> {
        match &self.state {
            LogState::Loaded(parsed) => Some(parsed),
            _ => None,
        }
    }

    /// Formatted text for the current step, if logs are loaded.
    pub fn content(&self) -> Option<String> {
        self.parsed().map(|parsed| parsed.format_step_logs(self.step))
    }

    fn reset(&mut self, job_id: Option<JobId>) {
        self.job_id = job_id;
        self.state = if job_id.is_some() {
            LogState::Loading
        } else {
            LogState::Empty
        };
        self.step = None;
    }

    fn step_next(&mut self) {
        let Some(count) = self.parsed().map(ParsedLogs::step_count) else {
            return;
        };
        if count == 0 {
            return;
        }
        self.step = match self.step {
            None => Some(0),
            Some(idx) if idx + 1 < count => Some(idx + 1),
            other => other,
        };
    }

    fn step_previous(&mut self) {
        if self.parsed().map_or(0, ParsedLogs::step_count) == 0 {
            return;
        }
        self.step = match self.step {
            Some(0) | None => None,
            Some(idx) => Some(idx - 1),
        };
    }
}

/// An action waiting for a yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirm {
    CancelRun(RunId),
}

impl PendingConfirm {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::CancelRun(_) => "Cancel this run?",
        }
    }
}

#[derive(Debug, Clone)]
struct Options {
    flash_duration: Duration,
    log_polling: bool,
    auto_refresh: bool,
    trigger_ref: String,
}

impl From<&SyncConfig> for Options {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            flash_duration: cfg.flash_duration,
            log_polling: cfg.log_polling,
            auto_refresh: cfg.auto_refresh,
            trigger_ref: cfg.trigger_ref.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Model {
    workflows: Arc<FilteredList<Workflow>>,
    runs: Arc<FilteredList<Run>>,
    jobs: Arc<FilteredList<Job>>,
    focus: Pane,
    logs: LogPane,
    error: Option<ClassifiedError>,
    flash: Option<String>,
    loading: bool,
    confirm: Option<PendingConfirm>,
    // Parent keys the runs / jobs lists were last populated for.
    runs_parent: Option<WorkflowId>,
    jobs_parent: Option<RunId>,
    log_polling: bool,
    options: Options,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

impl Model {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            workflows: Arc::new(FilteredList::new(|wf: &Workflow, filter: &str| {
                contains_ignore_case(&wf.name, filter)
            })),
            runs: Arc::new(FilteredList::new(|run: &Run, filter: &str| {
                contains_ignore_case(&run.branch, filter) || contains_ignore_case(&run.actor, filter)
            })),
            jobs: Arc::new(FilteredList::new(|job: &Job, filter: &str| {
                contains_ignore_case(&job.name, filter)
            })),
            focus: Pane::default(),
            logs: LogPane::default(),
            error: None,
            flash: None,
            loading: false,
            confirm: None,
            runs_parent: None,
            jobs_parent: None,
            log_polling: false,
            options: Options::from(cfg),
        }
    }

    /// Commands to run once at startup.
    pub fn init(&mut self) -> Command {
        self.loading = true;
        Command::batch([Command::FetchWorkflows, Command::ScheduleTick])
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn workflows(&self) -> &Arc<FilteredList<Workflow>> {
        &self.workflows
    }

    pub fn runs(&self) -> &Arc<FilteredList<Run>> {
        &self.runs
    }

    pub fn jobs(&self) -> &Arc<FilteredList<Job>> {
        &self.jobs
    }

    pub fn focus(&self) -> Pane {
        self.focus
    }

    pub fn logs(&self) -> &LogPane {
        &self.logs
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        self.error.as_ref()
    }

    pub fn flash(&self) -> Option<&str> {
        self.flash.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pending_confirm(&self) -> Option<PendingConfirm> {
        self.confirm
    }

    /// Whether a log poller is currently following the selected job.
    pub fn is_log_polling(&self) -> bool {
        self.log_polling
    }

    fn selected_workflow_id(&self) -> Option<WorkflowId> {
        self.workflows.selected().map(|wf| wf.id)
    }

    fn selected_run_id(&self) -> Option<RunId> {
        self.runs.selected().map(|run| run.id)
    }

    fn selected_job_id(&self) -> Option<JobId> {
        self.jobs.selected().map(|job| job.id)
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Fold one message into the state and return the follow-up work.
    pub fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::WorkflowsLoaded(result) => self.on_workflows_loaded(result),
            Msg::RunsLoaded {
                workflow_id,
                result,
            } => self.on_runs_loaded(workflow_id, result),
            Msg::JobsLoaded { run_id, result } => self.on_jobs_loaded(run_id, result),
            Msg::LogsLoaded { job_id, result } => self.on_logs_loaded(job_id, result),
            Msg::RunCancelled { result, .. } => self.on_action_result(result, "Run cancelled".into()),
            Msg::RunRerun { result, .. } => self.on_action_result(result, "Rerun triggered".into()),
            Msg::RerunFailedJobs { result, .. } => {
                self.on_action_result(result, "Rerun failed jobs triggered".into())
            }
            Msg::WorkflowTriggered { workflow, result } => {
                self.on_action_result(result, format!("Workflow triggered: {workflow}"))
            }
            Msg::Flash { message, .. } => {
                self.flash = Some(message);
                Command::None
            }
            Msg::FlashClear => {
                self.flash = None;
                Command::None
            }
            Msg::Tick { .. } => {
                if self.options.auto_refresh {
                    Command::batch([self.refresh_current_workflow(), Command::ScheduleTick])
                } else {
                    Command::ScheduleTick
                }
            }
            Msg::Intent(intent) => self.on_intent(intent),
        }
    }

    fn on_workflows_loaded(&mut self, result: Outcome<Vec<Workflow>>) -> Command {
        self.loading = false;
        match result {
            Err(err) => self.fail(err),
            Ok(workflows) => {
                self.workflows.replace(workflows);
                match self.selected_workflow_id() {
                    Some(workflow_id) => Command::FetchRuns { workflow_id },
                    None => self.clear_runs(),
                }
            }
        }
    }

    fn on_runs_loaded(&mut self, workflow_id: WorkflowId, result: Outcome<Vec<Run>>) -> Command {
        if self.selected_workflow_id() != Some(workflow_id) {
            return self.discard_stale("runs", workflow_id.get());
        }
        self.loading = false;
        let runs = match result {
            Err(err) => return self.fail(err),
            Ok(runs) => runs,
        };

        self.runs.replace(runs);
        if self.runs_parent != Some(workflow_id) {
            self.runs.select_first();
            self.runs_parent = Some(workflow_id);
        }
        match self.selected_run_id() {
            Some(run_id) => Command::FetchJobs { run_id },
            None => self.clear_jobs(),
        }
    }

    fn on_jobs_loaded(&mut self, run_id: RunId, result: Outcome<Vec<Job>>) -> Command {
        if self.selected_run_id() != Some(run_id) {
            return self.discard_stale("jobs", run_id.get());
        }
        self.loading = false;
        let jobs = match result {
            Err(err) => return self.fail(err),
            Ok(jobs) => jobs,
        };

        self.jobs.replace(jobs);
        if self.jobs_parent != Some(run_id) {
            self.jobs.select_first();
            self.jobs_parent = Some(run_id);
        }
        self.follow_selected_job()
    }

    fn on_logs_loaded(&mut self, job_id: JobId, result: Outcome<String>) -> Command {
        if self.selected_job_id() != Some(job_id) || self.logs.job_id != Some(job_id) {
            return self.discard_stale("logs", job_id.get());
        }
        match result {
            Err(err) => {
                self.logs.state = LogState::Failed(err.clone());
                self.error = Some(err);
                self.stop_log_polling()
            }
            Ok(raw) => {
                let parsed = parse_logs(&raw);
                if let Some(step) = self.logs.step {
                    if step >= parsed.step_count() {
                        self.logs.step = None;
                    }
                }
                self.logs.state = LogState::Loaded(parsed);

                let running = self.jobs.selected().is_some_and(|job| job.is_running());
                if running && self.options.log_polling {
                    self.log_polling = true;
                    Command::StartLogPolling { job_id }
                } else {
                    self.stop_log_polling()
                }
            }
        }
    }

    fn on_action_result(&mut self, result: Outcome<()>, success: String) -> Command {
        match result {
            Err(err) => self.fail(err),
            Ok(()) => Command::batch([
                Command::Flash {
                    message: success,
                    duration: self.options.flash_duration,
                },
                self.refresh_current_workflow(),
            ]),
        }
    }

    fn on_intent(&mut self, intent: Intent) -> Command {
        match intent {
            Intent::FocusNext => {
                self.focus = self.focus.next();
                Command::None
            }
            Intent::FocusPrevious => {
                self.focus = self.focus.previous();
                Command::None
            }
            Intent::SelectNext => self.move_cursor(true),
            Intent::SelectPrevious => self.move_cursor(false),
            Intent::ApplyFilter(text) => self.filter_focused(&text),
            Intent::ClearFilter => self.filter_focused(""),
            Intent::StepNext => {
                self.logs.step_next();
                Command::None
            }
            Intent::StepPrevious => {
                self.logs.step_previous();
                Command::None
            }
            Intent::Refresh => {
                self.loading = true;
                Command::FetchWorkflows
            }
            Intent::DismissError => {
                if self.error.take().is_none() {
                    return Command::None;
                }
                self.loading = true;
                Command::FetchWorkflows
            }
            Intent::CancelRun => {
                if let Some(run) = self.runs.selected().filter(Run::is_running) {
                    self.confirm = Some(PendingConfirm::CancelRun(run.id));
                }
                Command::None
            }
            Intent::Confirm => match self.confirm.take() {
                Some(PendingConfirm::CancelRun(run_id)) => Command::CancelRun { run_id },
                None => Command::None,
            },
            Intent::Deny => {
                self.confirm = None;
                Command::None
            }
            Intent::RerunRun => match self.selected_run_id() {
                Some(run_id) => Command::RerunWorkflow { run_id },
                None => Command::None,
            },
            Intent::RerunFailedJobs => match self.runs.selected().filter(Run::is_failed) {
                Some(run) => Command::RerunFailedJobs { run_id: run.id },
                None => Command::None,
            },
            Intent::TriggerWorkflow => match self.workflows.selected() {
                Some(wf) => Command::TriggerWorkflow {
                    file: wf.file_name().to_string(),
                    git_ref: self.options.trigger_ref.clone(),
                    inputs: HashMap::new(),
                },
                None => Command::None,
            },
        }
    }

    // ── Selection changes ────────────────────────────────────────────

    fn move_cursor(&mut self, forward: bool) -> Command {
        let before = self.focused_key();
        match (self.focus, forward) {
            (Pane::Workflows, true) => self.workflows.select_next(),
            (Pane::Workflows, false) => self.workflows.select_previous(),
            (Pane::Runs, true) => self.runs.select_next(),
            (Pane::Runs, false) => self.runs.select_previous(),
            (Pane::Jobs, true) => self.jobs.select_next(),
            (Pane::Jobs, false) => self.jobs.select_previous(),
        }
        self.on_selection_moved(before)
    }

    fn filter_focused(&mut self, text: &str) -> Command {
        let before = self.focused_key();
        match self.focus {
            Pane::Workflows => self.workflows.set_filter(text),
            Pane::Runs => self.runs.set_filter(text),
            Pane::Jobs => self.jobs.set_filter(text),
        }
        self.on_selection_moved(before)
    }

    fn focused_key(&self) -> Option<u64> {
        match self.focus {
            Pane::Workflows => self.selected_workflow_id().map(WorkflowId::get),
            Pane::Runs => self.selected_run_id().map(RunId::get),
            Pane::Jobs => self.selected_job_id().map(JobId::get),
        }
    }

    fn on_selection_moved(&mut self, before: Option<u64>) -> Command {
        if self.focused_key() == before {
            return Command::None;
        }
        // Everything below the moved cursor belongs to the old parent. Drop it
        // so late results keyed to it fail the selection check.
        match self.focus {
            Pane::Workflows => {
                let clear = self.clear_runs();
                match self.selected_workflow_id() {
                    Some(workflow_id) => {
                        self.loading = true;
                        Command::batch([clear, Command::FetchRuns { workflow_id }])
                    }
                    None => clear,
                }
            }
            Pane::Runs => {
                let clear = self.clear_jobs();
                match self.selected_run_id() {
                    Some(run_id) => {
                        self.loading = true;
                        Command::batch([clear, Command::FetchJobs { run_id }])
                    }
                    None => clear,
                }
            }
            Pane::Jobs => self.follow_selected_job(),
        }
    }

    /// Point the log pane at the selected job. Switching jobs stops the
    /// current poller and resets the pane before fetching.
    fn follow_selected_job(&mut self) -> Command {
        let selected = self.selected_job_id();
        if selected == self.logs.job_id {
            return match selected {
                Some(job_id) => Command::FetchLogs { job_id },
                None => Command::None,
            };
        }

        self.logs.reset(selected);
        let stop = self.stop_log_polling();
        match selected {
            Some(job_id) => Command::batch([stop, Command::FetchLogs { job_id }]),
            None => stop,
        }
    }

    fn clear_runs(&mut self) -> Command {
        self.runs.replace(Vec::new());
        self.runs_parent = None;
        self.clear_jobs()
    }

    fn clear_jobs(&mut self) -> Command {
        self.jobs.replace(Vec::new());
        self.jobs_parent = None;
        self.follow_selected_job()
    }

    fn refresh_current_workflow(&self) -> Command {
        match self.selected_workflow_id() {
            Some(workflow_id) => Command::FetchRuns { workflow_id },
            None => Command::None,
        }
    }

    fn stop_log_polling(&mut self) -> Command {
        if std::mem::take(&mut self.log_polling) {
            Command::StopLogPolling
        } else {
            Command::None
        }
    }

    fn fail(&mut self, err: ClassifiedError) -> Command {
        tracing::warn!(
            event = "sync.fetch.failed",
            kind = %err.kind,
            retryable = err.retryable,
            error = %err,
        );
        self.loading = false;
        self.error = Some(err);
        Command::None
    }

    fn discard_stale(&self, kind: &'static str, carried: u64) -> Command {
        tracing::debug!(event = "sync.result.stale", kind, carried);
        Command::None
    }
}
