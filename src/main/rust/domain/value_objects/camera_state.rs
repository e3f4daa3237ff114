use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Local camera state driving the idle/live pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    /// Idle filler feeds the proxy relay
    Idle,
    /// Live relay feeds the proxy relay
    Streaming,
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

impl FromStr for CameraState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "streaming" => Ok(Self::Streaming),
            other => Err(DomainError::UnknownCameraState(other.to_string())),
        }
    }
}

impl CameraState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Streaming => 1,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}
