//! Cancellable deadline-bound unit of work.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a deadline-bound unit of work resolved.
#[derive(Debug)]
pub enum DeadlineOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Drive `work` to completion unless the deadline elapses or the token is
/// cancelled first, whichever comes sooner. The losing future is dropped.
pub async fn run_with_deadline<T>(
    limit: Duration,
    cancel: &CancellationToken,
    work: impl Future<Output = T>,
) -> DeadlineOutcome<T> {
    tokio::select! {
        value = work => DeadlineOutcome::Completed(value),
        _ = tokio::time::sleep(limit) => DeadlineOutcome::TimedOut,
        _ = cancel.cancelled() => DeadlineOutcome::Cancelled,
    }
}
