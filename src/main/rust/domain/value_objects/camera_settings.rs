use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Timing and sizing of a camera and its pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    motion_timeout: Duration,
    status_interval: Duration,
    restart_delay: Duration,
    picture_queue_capacity: usize,
    availability_poll: Duration,
    drain_poll: Duration,
}

impl CameraSettings {
    pub fn new(
        motion_timeout: Duration,
        status_interval: Duration,
        restart_delay: Duration,
        picture_queue_capacity: usize,
    ) -> Result<Self> {
        if motion_timeout.is_zero() {
            return Err(DomainError::InvalidDuration("motion timeout"));
        }
        if status_interval.is_zero() {
            return Err(DomainError::InvalidDuration("status interval"));
        }
        if picture_queue_capacity == 0 {
            return Err(DomainError::InvalidQueueCapacity);
        }

        Ok(Self {
            motion_timeout,
            status_interval,
            restart_delay,
            picture_queue_capacity,
            availability_poll: Duration::from_secs(5),
            drain_poll: Duration::from_secs(1),
        })
    }

    /// Override the availability and drain poll intervals
    pub fn with_poll_intervals(mut self, availability_poll: Duration, drain_poll: Duration) -> Self {
        self.availability_poll = availability_poll;
        self.drain_poll = drain_poll;
        self
    }

    pub fn motion_timeout(&self) -> Duration {
        self.motion_timeout
    }

    pub fn status_interval(&self) -> Duration {
        self.status_interval
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    pub fn picture_queue_capacity(&self) -> usize {
        self.picture_queue_capacity
    }

    pub fn availability_poll(&self) -> Duration {
        self.availability_poll
    }

    pub fn drain_poll(&self) -> Duration {
        self.drain_poll
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            motion_timeout: Duration::from_secs(60),
            status_interval: Duration::from_secs(120),
            restart_delay: Duration::from_secs(3),
            picture_queue_capacity: 10,
            availability_poll: Duration::from_secs(5),
            drain_poll: Duration::from_secs(1),
        }
    }
}
