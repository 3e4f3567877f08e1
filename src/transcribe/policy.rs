use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::extractors::FetchError;

/// Produces the delay to wait before a retry
pub trait Backoff: Send + Sync {
    /// Delay before attempt `attempt` (1-based count of retries so far)
    fn delay(&self, attempt: u32) -> Duration;
}

/// Delay drawn uniformly from `[min, max]` regardless of attempt number
#[derive(Debug, Clone)]
pub struct UniformJitter {
    min: Duration,
    max: Duration,
}

impl UniformJitter {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl Default for UniformJitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

impl Backoff for UniformJitter {
    fn delay(&self, _attempt: u32) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Which errors earn another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Every error is retried
    #[default]
    Always,
    /// Permanent errors (transcripts disabled, video unavailable) stop the loop
    TransientOnly,
}

impl RetryOn {
    pub fn should_retry(&self, error: &FetchError) -> bool {
        match self {
            RetryOn::Always => true,
            RetryOn::TransientOnly => !error.is_permanent(),
        }
    }
}

/// Retry policy for one fetch call
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
    pub retry_on: RetryOn,
    pub overall_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.overall_timeout = timeout;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Arc::new(UniformJitter::default()),
            retry_on: RetryOn::Always,
            overall_timeout: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let retry_on = if config.short_circuit_permanent {
            RetryOn::TransientOnly
        } else {
            RetryOn::Always
        };

        RetryPolicy::new(config.max_attempts)
            .with_backoff(Arc::new(UniformJitter::new(config.min_delay(), config.max_delay())))
            .with_retry_on(retry_on)
            .with_overall_timeout(config.overall_timeout())
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("retry_on", &self.retry_on)
            .field("overall_timeout", &self.overall_timeout)
            .finish_non_exhaustive()
    }
}
