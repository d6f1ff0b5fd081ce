//! pipedeck-client: remote pipeline service contract.
//!
//! Provides the transport-agnostic `PipelineClient` trait plus everything the
//! synchronization engine needs around it:
//! - domain types (`Workflow`, `Run`, `Job`, `Step`) keyed by opaque ids
//! - `TransportError` → `ClassifiedError` classification
//! - `RetryPolicy` for bounded, backed-off read fetches
//! - `MockPipelineClient`, a recording mock for tests

pub mod error;
pub mod mock;
pub mod retry;
pub mod service;
pub mod types;

pub use error::{classify, is_retryable, ClassifiedError, ErrorKind, TransportError};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use service::PipelineClient;
pub use types::{
    Conclusion, Job, JobId, ListRunsOpts, Repository, Run, RunId, Status, Step, Workflow,
    WorkflowId,
};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "pipedeck-client"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "pipedeck-client");
    }
}
