//! Submit-then-poll primitive for asynchronous external jobs.
//!
//! Every long-running call in the pipeline (file processing, video
//! generation, merge jobs) has the same shape: submit, receive an operation
//! handle, re-check it until it is terminal. [`await_completion`] owns the
//! loop, the backoff, the deadline, and cancellation so callers only supply
//! the two service calls.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Status reported by a single poll of an operation handle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Still queued or running.
    Pending,
    /// Terminal success with the produced value.
    Done(T),
    /// Terminal failure reported by the service.
    Failed(String),
}

/// Final outcome of waiting on an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Succeeded(T),
    Failed(String),
    /// The deadline passed before a terminal state was observed.
    TimedOut { elapsed: Duration },
    /// The caller cancelled; the remote job state is unknown.
    Abandoned,
}

impl<T> PollOutcome<T> {
    pub fn is_terminal_on_remote(&self) -> bool {
        matches!(self, PollOutcome::Succeeded(_) | PollOutcome::Failed(_))
    }
}

/// Polling cadence and upper bound on total wait.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second check.
    pub interval: Duration,
    /// Ceiling for the backoff.
    pub max_interval: Duration,
    /// Growth factor applied to the interval after each pending check.
    pub multiplier: f64,
    /// Total time allowed from submission to a terminal state.
    pub deadline: Duration,
    /// Consecutive poll transport errors tolerated before giving up.
    pub max_poll_errors: u32,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(20),
            multiplier: 1.5,
            deadline: Duration::from_secs(300),
            max_poll_errors: 3,
            operation_name: "operation".to_string(),
        }
    }
}

impl PollConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        if self.max_interval < interval {
            self.max_interval = interval;
        }
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fixed interval, no growth.
    pub fn fixed(mut self) -> Self {
        self.multiplier = 1.0;
        self.max_interval = self.interval;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_interval)
    }
}

/// A submitted operation and how waiting on it ended.
#[derive(Debug, Clone)]
pub struct Completion<H, T> {
    pub handle: H,
    pub outcome: PollOutcome<T>,
}

/// Submit a job, then poll its handle until terminal, timed out, or cancelled.
///
/// Submission errors are returned as `Err`; everything after submission is
/// reported through [`PollOutcome`] together with the handle so the caller
/// can account for jobs that were never confirmed terminal.
pub async fn await_completion<H, T, S, SF, P, PF>(
    submit: S,
    poll: P,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<Completion<H, T>>
where
    H: Clone + std::fmt::Display,
    S: FnOnce() -> SF,
    SF: Future<Output = Result<H>>,
    P: Fn(H) -> PF,
    PF: Future<Output = Result<PollStatus<T>>>,
{
    if cancel.is_cancelled() {
        return Err(crate::error::ReelError::Cancelled(format!(
            "{} not submitted",
            config.operation_name
        )));
    }

    let handle = submit().await?;
    debug!("{} submitted: {}", config.operation_name, handle);

    let outcome = poll_until_complete(handle.clone(), poll, config, cancel).await;
    Ok(Completion { handle, outcome })
}

/// Poll an existing handle until terminal, timed out, or cancelled.
pub async fn poll_until_complete<H, T, P, PF>(
    handle: H,
    poll: P,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> PollOutcome<T>
where
    H: Clone + std::fmt::Display,
    P: Fn(H) -> PF,
    PF: Future<Output = Result<PollStatus<T>>>,
{
    let started = Instant::now();
    let deadline = started + config.deadline;
    let mut interval = config.interval;
    let mut poll_errors = 0u32;

    loop {
        match poll(handle.clone()).await {
            Ok(PollStatus::Done(value)) => return PollOutcome::Succeeded(value),
            Ok(PollStatus::Failed(reason)) => return PollOutcome::Failed(reason),
            Ok(PollStatus::Pending) => {
                poll_errors = 0;
            }
            Err(e) => {
                poll_errors += 1;
                if poll_errors > config.max_poll_errors {
                    return PollOutcome::Failed(format!(
                        "{} poll failed {} times in a row: {}",
                        config.operation_name, poll_errors, e
                    ));
                }
                warn!("{} poll of {} failed: {}", config.operation_name, handle, e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut {
                elapsed: now - started,
            };
        }

        let wait = interval.min(deadline - now);
        debug!("{} {} pending, next check in {:?}", config.operation_name, handle, wait);

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Abandoned,
            _ = tokio::time::sleep(wait) => {}
        }

        if Instant::now() >= deadline {
            // One last look so a job finishing right at the deadline is not misreported.
            return match poll(handle.clone()).await {
                Ok(PollStatus::Done(value)) => PollOutcome::Succeeded(value),
                Ok(PollStatus::Failed(reason)) => PollOutcome::Failed(reason),
                _ => PollOutcome::TimedOut {
                    elapsed: Instant::now() - started,
                },
            };
        }

        interval = config.next_interval(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(deadline_secs: u64) -> PollConfig {
        PollConfig::new("test")
            .with_interval(Duration::from_secs(5))
            .with_max_interval(Duration::from_secs(20))
            .with_deadline(Duration::from_secs(deadline_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_pending_polls() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let completion = await_completion(
            || async { Ok("op-1".to_string()) },
            move |_handle: String| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Ok(PollStatus::Pending)
                    } else {
                        Ok(PollStatus::Done("video.mp4"))
                    }
                }
            },
            &config(300),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(completion.handle, "op-1");
        assert_eq!(completion.outcome, PollOutcome::Succeeded("video.mp4"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out() {
        let started = Instant::now();
        let completion = await_completion(
            || async { Ok("op-2".to_string()) },
            |_handle: String| async { Ok(PollStatus::<()>::Pending) },
            &config(300),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        match completion.outcome {
            PollOutcome::TimedOut { elapsed } => {
                assert!(elapsed >= Duration::from_secs(300));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(Instant::now() - started < Duration::from_secs(330));
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_failure_is_failed_not_timeout() {
        let completion = await_completion(
            || async { Ok("op-3".to_string()) },
            |_handle: String| async { Ok(PollStatus::<()>::Failed("quota".to_string())) },
            &config(300),
            &CancellationToken::new(),
        )
        .await;

        let completion = tokio_test::assert_ok!(completion);
        assert_eq!(completion.outcome, PollOutcome::Failed("quota".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_poll_errors_fail() {
        let completion = await_completion(
            || async { Ok("op-4".to_string()) },
            |_handle: String| async {
                Err::<PollStatus<()>, _>(ReelError::GenerationFailed("503".to_string()))
            },
            &config(300),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(completion.outcome, PollOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_in_flight_poll() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let completion = await_completion(
            || async { Ok("op-5".to_string()) },
            |_handle: String| async { Ok(PollStatus::<()>::Pending) },
            &config(300),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(completion.outcome, PollOutcome::Abandoned);
        assert!(!completion.outcome.is_terminal_on_remote());
    }

    #[tokio::test]
    async fn test_cancelled_before_submit() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let submitted = Arc::new(AtomicU32::new(0));
        let flag = submitted.clone();
        let result = await_completion(
            move || async move {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok("op-6".to_string())
            },
            |_handle: String| async { Ok(PollStatus::<()>::Pending) },
            &config(300),
            &cancel,
        )
        .await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, ReelError::Cancelled(_)));
        assert_eq!(submitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backoff_is_capped() {
        let cfg = config(300);
        let mut interval = cfg.interval;
        for _ in 0..10 {
            interval = cfg.next_interval(interval);
        }
        assert_eq!(interval, Duration::from_secs(20));
        assert_eq!(cfg.clone().fixed().next_interval(cfg.interval), cfg.interval);
    }
}
