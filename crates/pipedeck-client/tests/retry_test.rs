#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Retry policy behavior against scripted failures.
//!
//! Time is paused so backoff sleeps complete instantly while still being
//! measurable through `tokio::time::Instant`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipedeck_client::error::{ErrorKind, TransportError};
use pipedeck_client::mock::{test_workflow, MockMethod, MockPipelineClient};
use pipedeck_client::retry::{retry_with_backoff, RetryPolicy};
use pipedeck_client::service::PipelineClient;
use pipedeck_client::types::Repository;

fn scripted(
    failures: Vec<TransportError>,
) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<u32, TransportError>>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut remaining = failures.into_iter();
    let op = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        std::future::ready(match remaining.next() {
            Some(err) => Err(err),
            None => Ok(n),
        })
    };
    (calls, op)
}

// ── success after transient failures ──

#[tokio::test(start_paused = true)]
async fn succeeds_after_two_retryable_failures() {
    let (calls, op) = scripted(vec![
        TransportError::http(503, "unavailable"),
        TransportError::http(502, "bad gateway"),
    ]);

    let result = retry_with_backoff(3, op).await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn waits_exponential_backoff_between_attempts() {
    let policy = RetryPolicy {
        attempts: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(5),
    };
    let (_, op) = scripted(vec![
        TransportError::network("reset"),
        TransportError::network("reset"),
    ]);

    let started = tokio::time::Instant::now();
    policy.run(op).await.unwrap();

    // 100ms after the first failure, 200ms after the second.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
}

// ── non-retryable failures ──

#[tokio::test(start_paused = true)]
async fn stops_after_one_attempt_on_non_retryable_failure() {
    let (calls, op) = scripted(vec![TransportError::http(401, "bad credentials")]);

    let err = retry_with_backoff(3, op).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert!(!err.retryable);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_not_retried() {
    let (calls, op) = scripted(vec![TransportError::http(404, "missing")]);

    let err = retry_with_backoff(5, op).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── exhaustion ──

#[tokio::test(start_paused = true)]
async fn returns_last_failure_when_attempts_are_exhausted() {
    let (calls, op) = scripted(vec![
        TransportError::http(500, "first"),
        TransportError::http(500, "second"),
        TransportError::http(429, "third"),
        TransportError::http(500, "never reached"),
    ]);

    let err = retry_with_backoff(3, op).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::RateLimit);
    assert_eq!(
        err.cause,
        Some(TransportError::http(429, "third")),
        "the most recent failure is surfaced"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn zero_attempts_still_runs_once() {
    let (calls, op) = scripted(vec![TransportError::http(500, "boom")]);

    let err = retry_with_backoff(0, op).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── against the mock client ──

#[tokio::test(start_paused = true)]
async fn retries_mock_client_list_workflows() {
    let client = MockPipelineClient::new()
        .with_workflows(vec![test_workflow(1, "CI")])
        .with_failures(
            MockMethod::ListWorkflows,
            vec![TransportError::network("timeout")],
        );
    let repo = Repository::new("octo", "deck");

    let workflows = RetryPolicy::default()
        .run(|| client.list_workflows(&repo))
        .await
        .unwrap();

    assert_eq!(workflows.len(), 1);
    assert_eq!(client.call_count(MockMethod::ListWorkflows), 2);
}
