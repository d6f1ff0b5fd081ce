//! Job log segmentation into steps.
//!
//! Job logs delimit each step with `##[group]<name>` ... `##[endgroup]`.
//! The engine only needs the step boundaries so the log pane can track a
//! step cursor; presentation stays with the renderer.

use std::sync::OnceLock;

use regex::Regex;

/// One delimited step of a job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLog {
    pub name: String,
    /// Lines of the step, including its group markers.
    pub lines: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
}

/// A job log split into steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLogs {
    pub steps: Vec<StepLog>,
    pub raw: String,
    pub lines: Vec<String>,
}

fn group_start() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"##\[group\](.+)$").ok()).as_ref()
}

fn group_end() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"##\[endgroup\]").ok()).as_ref()
}

fn timestamp_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}T(\d{2}:\d{2}:\d{2})\.\d+Z)\s*").ok())
        .as_ref()
}

/// Split raw log text into steps.
///
/// A new group start closes a still-open group on the previous line; a group
/// still open at the end of input (step still running) extends to the last
/// line. Lines outside any group belong to no step.
pub fn parse_logs(raw: &str) -> ParsedLogs {
    let mut parsed = ParsedLogs {
        raw: raw.to_string(),
        ..ParsedLogs::default()
    };
    if raw.is_empty() {
        return parsed;
    }

    parsed.lines = raw.split('\n').map(str::to_string).collect();
    let mut current: Option<StepLog> = None;

    for (i, line) in parsed.lines.iter().enumerate() {
        if let Some(caps) = group_start().and_then(|re| re.captures(line)) {
            if let Some(mut open) = current.take() {
                open.end_line = i.saturating_sub(1);
                parsed.steps.push(open);
            }
            current = Some(StepLog {
                name: caps.get(1).map_or("", |m| m.as_str()).to_string(),
                lines: vec![line.clone()],
                start_line: i,
                end_line: i,
            });
            continue;
        }

        if group_end().is_some_and(|re| re.is_match(line)) {
            if let Some(mut open) = current.take() {
                open.lines.push(line.clone());
                open.end_line = i;
                parsed.steps.push(open);
            }
            continue;
        }

        if let Some(open) = current.as_mut() {
            open.lines.push(line.clone());
        }
    }

    if let Some(mut open) = current {
        open.end_line = parsed.lines.len() - 1;
        parsed.steps.push(open);
    }

    parsed
}

impl ParsedLogs {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Text of one step, or the whole log for `None`. Out-of-range indexes
    /// yield an empty string.
    pub fn step_logs(&self, step: Option<usize>) -> String {
        match step {
            None => self.raw.clone(),
            Some(idx) => self
                .steps
                .get(idx)
                .map(|s| s.lines.join("\n"))
                .unwrap_or_default(),
        }
    }

    /// `step_logs` with every line passed through [`format_log_line`].
    pub fn format_step_logs(&self, step: Option<usize>) -> String {
        let logs = self.step_logs(step);
        if logs.is_empty() {
            return logs;
        }
        logs.split('\n')
            .map(format_log_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Shorten a leading `2024-01-15T10:00:00.000Z ` timestamp to `10:00:00 `.
pub fn format_log_line(line: &str) -> String {
    let Some(caps) = timestamp_prefix().and_then(|re| re.captures(line)) else {
        return line.to_string();
    };
    let (Some(whole), Some(time)) = (caps.get(0), caps.get(2)) else {
        return line.to_string();
    };
    format!("{} {}", time.as_str(), &line[whole.end()..])
}
