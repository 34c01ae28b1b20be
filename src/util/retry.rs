//! Bounded retry with a fixed backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// What a single attempt decided.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The attempt produced a usable value; stop retrying.
    Done(T),
    /// The attempt failed in a way worth retrying.
    Retry,
    /// The attempt failed in a way retrying cannot fix; give up now.
    Halt,
}

/// Retry policy: a fixed number of attempts separated by a fixed backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Run `operation` until it yields [`Attempt::Done`], halts, exhausts the
    /// attempt budget, or the token is cancelled.
    ///
    /// The backoff wait is itself cancellable: a cancellation during the
    /// inter-attempt delay resolves immediately as `None`.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut operation: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return None;
            }

            match operation(attempt).await {
                Attempt::Done(value) => return Some(value),
                Attempt::Halt => return None,
                Attempt::Retry => {
                    if attempt < self.max_attempts {
                        tracing::debug!(
                            attempt,
                            max_attempts = self.max_attempts,
                            backoff_ms = self.backoff.as_millis() as u64,
                            "attempt failed, backing off before retry"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(self.backoff) => {}
                            _ = cancel.cancelled() => return None,
                        }
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn policy(max_attempts: u32, backoff_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_done() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let cancel = CancellationToken::new();

        let result = policy(5, 100)
            .run(&cancel, |_| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Attempt::Retry
                    } else {
                        Attempt::Done("ok")
                    }
                }
            })
            .await;

        assert_eq!(result, Some("ok"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempt_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let cancel = CancellationToken::new();

        let result: Option<()> = policy(3, 100)
            .run(&cancel, |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Attempt::Retry
                }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn halt_stops_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let cancel = CancellationToken::new();

        let result: Option<()> = policy(5, 1)
            .run(&cancel, |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Attempt::Halt
                }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_skips_all_attempts() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Option<()> = policy(3, 1)
            .run(&cancel, |_| async { Attempt::Retry })
            .await;

        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff_wait() {
        let cancel = CancellationToken::new();
        let for_task = cancel.clone();

        let task = tokio::spawn(async move {
            policy(3, 60_000)
                .run(&for_task, |_| async { Attempt::<()>::Retry })
                .await
        });

        tokio::task::yield_now().await;
        cancel.cancel();
        let result = task.await.unwrap();
        assert_eq!(result, None);
    }
}
