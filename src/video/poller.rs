//! Completion polling for asynchronous provider jobs.

use crate::error::{ClipForgeError, Result};
use crate::video::types::JobStatus;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline and interval for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Total time allowed before giving up.
    pub max_wait: Duration,
    /// Fixed delay between status checks.
    pub interval: Duration,
}

impl PollSettings {
    /// Creates poll settings.
    pub const fn new(max_wait: Duration, interval: Duration) -> Self {
        Self { max_wait, interval }
    }
}

/// Polls `status_fn` until the job reaches a terminal state or the deadline passes.
///
/// Returns the terminal [`JobStatus`] (`Completed` or `Failed`). Transient
/// errors and unrecognized status codes are logged and polling continues;
/// any other error from `status_fn` is returned as is. When the deadline
/// elapses, fails with [`ClipForgeError::Timeout`].
///
/// Checks happen at `0, interval, 2*interval, ...` strictly before the
/// deadline, so a 3s deadline with a 1s interval performs exactly 3 checks.
/// A check still in flight when the deadline passes is abandoned.
pub async fn poll_until_terminal<F, Fut>(
    job_id: &str,
    mut status_fn: F,
    settings: PollSettings,
) -> Result<JobStatus>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<JobStatus>>,
{
    let start = Instant::now();
    let deadline = start + settings.max_wait;
    let mut attempt: u32 = 0;

    while Instant::now() < deadline {
        attempt += 1;

        let check = status_fn(job_id.to_string());
        let outcome = match tokio::time::timeout_at(deadline, check).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(job_id = %job_id, attempt, "status check still running at deadline");
                break;
            }
        };

        match outcome {
            Ok(status) if status.is_terminal() => {
                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    elapsed_secs = start.elapsed().as_secs(),
                    "job reached terminal state"
                );
                return Ok(status);
            }
            Ok(JobStatus::Unknown { code }) => {
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    code = %code,
                    "unrecognized job status, treating as pending"
                );
            }
            Ok(_) => {
                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    elapsed_secs = start.elapsed().as_secs(),
                    "job still pending"
                );
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(job_id = %job_id, attempt, "status check failed, will retry: {e}");
            }
            Err(e) => return Err(e),
        }

        let next = Instant::now() + settings.interval;
        tokio::time::sleep_until(next.min(deadline)).await;
    }

    Err(ClipForgeError::Timeout {
        job_id: job_id.to_string(),
        waited: settings.max_wait,
    })
}
