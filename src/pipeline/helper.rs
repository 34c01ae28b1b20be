//! Helper-process credential source.
//!
//! Walks a fixed, ordered list of candidate executable paths, skipping
//! paths that do not exist, and asks each existing helper for a token.
//! Every attempt is a single cancellable, deadline-bound unit of work; a
//! bounded-retry policy with a fixed backoff wraps the attempts. Helpers
//! run in their own process group so a timeout or cancellation can take
//! the whole tree down, descendants included.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Credential, CredentialSource, SourceDecision};
use crate::protocol::CredentialRequest;
use crate::util::deadline::{run_with_deadline, DeadlineOutcome};
use crate::util::retry::{Attempt, RetryPolicy};

/// The single fixed argument passed to every helper invocation.
const HELPER_ARG: &str = "get-token";

/// Timing and budget for helper invocations.
#[derive(Debug, Clone)]
pub struct HelperPolicy {
    /// Attempts per candidate path, including the first.
    pub max_attempts: u32,
    /// Deadline for one spawn-to-exit cycle.
    pub attempt_timeout: Duration,
    /// Fixed delay between attempts on the same path.
    pub backoff: Duration,
}

impl Default for HelperPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(2),
        }
    }
}

/// The fixed candidate helper locations, most specific first.
pub fn default_candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(base) = directories::BaseDirs::new() {
        #[cfg(unix)]
        paths.push(base.home_dir().join(".credprov").join("token-helper"));
        #[cfg(windows)]
        paths.push(base.home_dir().join(".credprov").join("token-helper.exe"));
    }

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/artifact-token-helper"));
        paths.push(PathBuf::from("/opt/credprov/token-helper"));
    }

    #[cfg(windows)]
    {
        if let Ok(program_files) = std::env::var("ProgramFiles") {
            paths.push(
                PathBuf::from(program_files)
                    .join("credprov")
                    .join("token-helper.exe"),
            );
        }
    }

    paths
}

/// Credential source backed by a local helper executable.
pub struct HelperProcessSource {
    candidates: Vec<PathBuf>,
    policy: HelperPolicy,
}

impl HelperProcessSource {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self::with_policy(candidates, HelperPolicy::default())
    }

    /// Construct with an explicit policy. Production construction always
    /// uses [`HelperPolicy::default`]; timing-sensitive tests shrink it.
    pub fn with_policy(candidates: Vec<PathBuf>, policy: HelperPolicy) -> Self {
        Self { candidates, policy }
    }

    /// One spawn-to-exit cycle against a single helper path.
    async fn invoke_once(
        &self,
        path: &Path,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Attempt<String> {
        let mut command = Command::new(path);
        command
            .arg(HELPER_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // New process group, so a timeout can signal the whole tree.
        #[cfg(unix)]
        command.process_group(0);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "helper failed to launch, skipping this candidate"
                );
                return Attempt::Halt;
            }
        };
        let pid = child.id();

        tracing::debug!(path = %path.display(), attempt, "helper spawned");

        match run_with_deadline(self.policy.attempt_timeout, cancel, child.wait_with_output()).await
        {
            DeadlineOutcome::Completed(Ok(output)) => {
                if !output.status.success() {
                    tracing::debug!(
                        path = %path.display(),
                        status = ?output.status.code(),
                        "helper exited non-zero"
                    );
                    return Attempt::Retry;
                }

                let raw = String::from_utf8_lossy(&output.stdout);
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    tracing::debug!(path = %path.display(), "helper produced no output");
                    return Attempt::Retry;
                }
                if starts_with_error_marker(trimmed) {
                    tracing::debug!(path = %path.display(), "helper reported an error");
                    return Attempt::Retry;
                }

                Attempt::Done(trimmed.to_string())
            }
            DeadlineOutcome::Completed(Err(error)) => {
                tracing::warn!(path = %path.display(), %error, "helper wait failed");
                Attempt::Retry
            }
            DeadlineOutcome::TimedOut => {
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    timeout_ms = self.policy.attempt_timeout.as_millis() as u64,
                    "helper timed out, killing process tree"
                );
                kill_process_tree(pid).await;
                Attempt::Retry
            }
            DeadlineOutcome::Cancelled => {
                tracing::debug!(path = %path.display(), "helper invocation cancelled");
                kill_process_tree(pid).await;
                Attempt::Halt
            }
        }
    }
}

#[async_trait]
impl CredentialSource for HelperProcessSource {
    fn name(&self) -> &'static str {
        "helper-process"
    }

    async fn acquire(
        &self,
        _request: &CredentialRequest,
        cancel: &CancellationToken,
    ) -> SourceDecision {
        let retry = RetryPolicy {
            max_attempts: self.policy.max_attempts,
            backoff: self.policy.backoff,
        };

        for path in &self.candidates {
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "candidate helper not present");
                continue;
            }

            let token = retry
                .run(cancel, |attempt| self.invoke_once(path, attempt, cancel))
                .await;

            if let Some(token) = token {
                return SourceDecision::Yield(Credential::token(token));
            }
            if cancel.is_cancelled() {
                return SourceDecision::Abort("credential request was cancelled".to_string());
            }
            // Budget exhausted for this path; move to the next candidate.
        }

        SourceDecision::Pass
    }
}

/// Case-insensitive check for the `Error` output convention.
fn starts_with_error_marker(output: &str) -> bool {
    output
        .as_bytes()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"error"))
}

/// Kill a helper and everything it spawned.
///
/// On unix the helper runs in its own process group, so signalling the
/// negative pid reaches descendants; tokio's `kill_on_drop` already covers
/// the direct child. On windows, `taskkill /T` walks the tree.
async fn kill_process_tree(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };

    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if result != 0 {
            tracing::debug!(pid, "process group already gone");
        }
    }

    #[cfg(windows)]
    {
        let result = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(error) = result {
            tracing::debug!(pid, %error, "taskkill failed");
        }
    }
}
