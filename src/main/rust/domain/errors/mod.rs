use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid topic template: {0} (must contain {{name}})")]
    InvalidTopicTemplate(String),

    #[error("Invalid duration for {0}: must be greater than zero")]
    InvalidDuration(&'static str),

    #[error("Invalid backoff multiplier: must be >= 1.0")]
    InvalidBackoffMultiplier,

    #[error("Invalid queue capacity: must be greater than zero")]
    InvalidQueueCapacity,

    #[error("Unknown camera state: {0}")]
    UnknownCameraState(String),

    #[error("Invalid command payload: {0}")]
    InvalidCommand(String),

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Invalid siren arguments: {0}")]
    InvalidSirenArguments(String),

    #[error("Device SDK call failed: {0}")]
    SdkCallFailed(String),

    #[error("Pipeline spawn failed: {0}")]
    PipelineSpawnFailed(String),

    #[error("Pipeline wait failed: {0}")]
    PipelineWaitFailed(String),

    #[error("Pipeline kill failed: {0}")]
    PipelineKillFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport connection closed")]
    TransportClosed,
}

pub type Result<T> = std::result::Result<T, DomainError>;
