use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Delay policy for transport reconnection attempts
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Result<Self> {
        if multiplier < 1.0 {
            return Err(DomainError::InvalidBackoffMultiplier);
        }
        if initial_delay.is_zero() {
            return Err(DomainError::InvalidDuration("reconnect delay"));
        }

        Ok(Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            multiplier,
        })
    }

    /// Same delay before every attempt
    pub fn fixed(delay: Duration) -> Result<Self> {
        Self::new(delay, delay, 1.0)
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Calculate the next backoff delay based on current delay
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier);
        next.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
        }
    }
}
