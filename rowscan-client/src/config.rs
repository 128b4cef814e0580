/// Read configuration for retries, backoff, deadlines and delivery
use crate::error::{ClientError, Result};
use crate::retry::{
    BackoffPolicy, ExponentialBackoffPolicy, LimitedErrorCountRetryPolicy,
    LimitedTimeRetryPolicy, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadRowsConfig {
    /// App profile used when a read does not name one
    pub app_profile_id: Option<String>,

    /// Deadline of each streaming attempt (None = no deadline)
    pub attempt_timeout_ms: Option<u64>,

    /// Transient failures tolerated per read (not including the initial attempt)
    pub max_retries: u32,

    /// When set, retry for this long instead of counting failures
    pub max_retry_elapsed_ms: Option<u64>,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier applied to backoff after each retry
    pub backoff_multiplier: f64,

    /// Synchronously acknowledged rows the async cursor delivers before
    /// yielding to the scheduler
    pub max_sync_deliveries: usize,
}

impl Default for ReadRowsConfig {
    /// Same as `standard()`.
    fn default() -> Self {
        Self::standard()
    }
}

impl ReadRowsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
            ..Self::standard()
        }
    }

    /// Returns a configuration optimized for quick transient failures.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
            backoff_multiplier: 2.0,
            ..Self::standard()
        }
    }

    pub fn standard() -> Self {
        Self {
            app_profile_id: None,
            attempt_timeout_ms: None,
            max_retries: 5,
            max_retry_elapsed_ms: None,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            max_sync_deliveries: 100,
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClientError::InvalidArgument(format!("Invalid read config: {}", e)))?;
        config.validate().map_err(ClientError::InvalidArgument)?;
        Ok(config)
    }

    pub fn with_app_profile_id(mut self, id: impl Into<String>) -> Self {
        self.app_profile_id = Some(id.into());
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Switch to a time-bounded retry policy
    pub fn with_max_retry_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_retry_elapsed_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_sync_deliveries(mut self, n: usize) -> Self {
        self.max_sync_deliveries = n;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_sync_deliveries == 0 {
            return Err("max_sync_deliveries must be greater than 0".to_string());
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err("initial_backoff_ms must not exceed max_backoff_ms".to_string());
        }

        if self.attempt_timeout_ms == Some(0) {
            return Err("attempt_timeout_ms must be greater than 0 when set".to_string());
        }

        Ok(())
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    /// Retry policy prototype for reads using this configuration
    pub fn retry_policy(&self) -> Box<dyn RetryPolicy> {
        match self.max_retry_elapsed_ms {
            Some(ms) => Box::new(LimitedTimeRetryPolicy::new(Duration::from_millis(ms))),
            None => Box::new(LimitedErrorCountRetryPolicy::new(self.max_retries)),
        }
    }

    /// Backoff policy prototype for reads using this configuration
    pub fn backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        Box::new(ExponentialBackoffPolicy::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.backoff_multiplier,
        ))
    }
}
