//! pipedeck-sync: the dashboard's synchronization engine.
//!
//! A single update function ([`Model::update`]) owns all state. Background
//! fetches run on tokio tasks spawned by the [`Dispatcher`] and come back as
//! keyed [`Msg`]s; results for entities that are no longer selected are
//! dropped by the reconciler. Polling cadence adapts to the service's
//! remaining rate budget.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod filtered_list;
pub mod log_parser;
pub mod logging;
pub mod message;
pub mod model;
pub mod poller;
pub mod runtime;
pub mod ticker;

pub use command::Command;
pub use config::{ConfigError, SyncConfig};
pub use dispatch::Dispatcher;
pub use filtered_list::{contains_ignore_case, FilteredList};
pub use log_parser::{format_log_line, parse_logs, ParsedLogs, StepLog};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig, LoggingError};
pub use message::{Intent, Msg, Outcome};
pub use model::{LogPane, LogState, Model, Pane, PendingConfirm};
pub use poller::AdaptivePoller;
pub use runtime::SyncRuntime;
pub use ticker::PeriodicTask;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "pipedeck-sync"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "pipedeck-sync");
    }
}
