//! Retry Policy
//!
//! Pure decision logic for the executor's retry loop: given a classified
//! error and the number of retries already performed, decide retry-or-not
//! and the backoff delay. The loop itself lives in the executor; this module
//! has no side effects.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::ClientConfig;
use crate::defaults;
use crate::error::ErpError;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial delay between retries
    initial_backoff: Duration,
    /// Maximum delay between retries
    max_backoff: Duration,
    /// Backoff multiplier (for exponential backoff)
    backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    ///
    /// Off by default so that computed delays are non-decreasing in the
    /// attempt count.
    use_jitter: bool,
    /// Maximum jitter percentage (0.0 to 1.0)
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::retry::MAX_RETRIES,
            initial_backoff: defaults::retry::INITIAL_BACKOFF,
            max_backoff: defaults::retry::MAX_BACKOFF,
            backoff_multiplier: defaults::retry::BACKOFF_MULTIPLIER,
            use_jitter: false,
            jitter_factor: defaults::retry::JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a policy from a client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::default().with_max_retries(config.max_retries)
    }

    /// Set maximum retry attempts
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial backoff delay
    pub const fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set maximum backoff delay
    pub const fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Set backoff multiplier
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Set jitter factor
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Maximum number of retry attempts this policy allows.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide whether another attempt may be made.
    ///
    /// `attempt` is the number of retries already performed. The rules, in
    /// order: deny once the configured limit is reached; allow timeouts and
    /// connection failures; allow HTTP 409 conflicts; deny everything else.
    pub fn should_retry(&self, error: &ErpError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        error.is_retryable()
    }

    /// Calculate the backoff delay for a given attempt.
    ///
    /// Grows exponentially with the attempt count and is capped at the
    /// configured maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_backoff);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    /// Add jitter to a delay
    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-jitter_range..=jitter_range);

        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}

/// Attempt bookkeeping for one executor invocation.
#[derive(Debug)]
pub(crate) struct RetryState {
    /// Retries performed so far (the first attempt is not a retry).
    pub(crate) retries: u32,
    started: Instant,
}

impl RetryState {
    pub(crate) fn new() -> Self {
        Self {
            retries: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ErpError {
        ErpError::TimeoutError("timed out".into())
    }

    fn conflict() -> ErpError {
        ErpError::ApiError {
            status: 409,
            message: "conflict".into(),
            request_id: None,
            response: None,
        }
    }

    #[test]
    fn retries_timeouts_and_connection_failures_below_the_limit() {
        let policy = RetryPolicy::new().with_max_retries(3);
        for attempt in 0..3 {
            assert!(policy.should_retry(&timeout(), attempt));
            assert!(policy.should_retry(&ErpError::ConnectionError("refused".into()), attempt));
        }
    }

    #[test]
    fn never_retries_at_or_past_the_limit() {
        let policy = RetryPolicy::new().with_max_retries(2);
        assert!(!policy.should_retry(&timeout(), 2));
        assert!(!policy.should_retry(&conflict(), 5));
    }

    #[test]
    fn retries_conflict_status_only_among_api_errors() {
        let policy = RetryPolicy::new().with_max_retries(3);
        assert!(policy.should_retry(&conflict(), 0));
        for status in [400, 404, 500] {
            let error = ErpError::ApiError {
                status,
                message: "nope".into(),
                request_id: None,
                response: None,
            };
            assert!(!policy.should_retry(&error, 0), "status {status}");
        }
    }

    #[test]
    fn backoff_is_non_decreasing_and_capped() {
        let policy = RetryPolicy::new()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(2));
        let mut previous = Duration::ZERO;
        for attempt in 0..10 {
            let delay = policy.backoff(attempt);
            assert!(delay >= previous, "attempt {attempt}");
            assert!(delay <= Duration::from_secs(2));
            previous = delay;
        }
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_the_configured_factor() {
        let policy = RetryPolicy::new()
            .with_initial_backoff(Duration::from_millis(1000))
            .with_jitter(true)
            .with_jitter_factor(0.1);
        for _ in 0..50 {
            let delay = policy.backoff(0).as_millis() as u64;
            assert!((900..=1100).contains(&delay), "delay {delay}ms out of range");
        }
    }
}
