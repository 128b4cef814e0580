use std::fmt;
use std::time::{Duration, Instant};
use tonic::{Code, Status};

/// Decides which failed attempts are retried, and for how long.
///
/// A read clones its policy once with [`clone_box`](RetryPolicy::clone_box)
/// and threads that single instance through every attempt, so counters and
/// clocks cover the whole read.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// True if an attempt ending with `status` may be retried.
    fn is_transient(&self, status: &Status) -> bool {
        is_transient_status(status)
    }

    /// Record one transient failure.
    fn on_failure(&mut self);

    /// True once the budget of this read is used up.
    fn is_exhausted(&self) -> bool;

    /// A fresh copy for a new read.
    fn clone_box(&self) -> Box<dyn RetryPolicy>;
}

/// Computes the wait before the next attempt.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    fn next_delay(&mut self) -> Duration;

    /// A fresh copy for a new read.
    fn clone_box(&self) -> Box<dyn BackoffPolicy>;
}

/// Default transient classification for streaming reads.
///
/// Besides the plainly transient codes, an `Internal` status caused by the
/// HTTP/2 stream being torn down under the call is also retried.
pub fn is_transient_status(status: &Status) -> bool {
    match status.code() {
        Code::Unavailable | Code::Aborted | Code::DeadlineExceeded => true,
        Code::Internal => {
            let msg = status.message();
            msg.contains("RST_STREAM")
                || msg.contains("Received unexpected EOS on DATA frame from server")
        }
        _ => false,
    }
}

/// Tolerates a fixed number of transient failures per read.
#[derive(Debug, Clone)]
pub struct LimitedErrorCountRetryPolicy {
    /// Failures tolerated (not counting the initial attempt)
    max_failures: u32,
    failures: u32,
}

impl LimitedErrorCountRetryPolicy {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            failures: 0,
        }
    }

    /// Returns a policy with no retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl RetryPolicy for LimitedErrorCountRetryPolicy {
    fn on_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    fn is_exhausted(&self) -> bool {
        self.failures > self.max_failures
    }

    fn clone_box(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.max_failures))
    }
}

/// Retries transient failures until a wall-clock budget runs out.
///
/// The clock starts when the policy is cloned for a read.
#[derive(Debug, Clone)]
pub struct LimitedTimeRetryPolicy {
    max_elapsed: Duration,
    started: Instant,
}

impl LimitedTimeRetryPolicy {
    pub fn new(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            started: Instant::now(),
        }
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }
}

impl RetryPolicy for LimitedTimeRetryPolicy {
    fn on_failure(&mut self) {}

    fn is_exhausted(&self) -> bool {
        self.started.elapsed() > self.max_elapsed
    }

    fn clone_box(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.max_elapsed))
    }
}

/// Exponential backoff: `initial * multiplier^n`, capped at `maximum`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    initial: Duration,
    maximum: Duration,
    multiplier: f64,
    attempt: u32,
}

impl ExponentialBackoffPolicy {
    pub fn new(initial: Duration, maximum: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            maximum,
            multiplier,
            attempt: 0,
        }
    }

    /// Calculates the backoff duration for a given attempt number (0-indexed).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff_ms = (self.initial.as_millis() as f64
            * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32))
            .min(self.maximum.as_millis() as f64) as u64;
        Duration::from_millis(backoff_ms)
    }
}

impl BackoffPolicy for ExponentialBackoffPolicy {
    fn next_delay(&mut self) -> Duration {
        let delay = self.backoff_duration(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    fn clone_box(&self) -> Box<dyn BackoffPolicy> {
        Box::new(Self::new(self.initial, self.maximum, self.multiplier))
    }
}
