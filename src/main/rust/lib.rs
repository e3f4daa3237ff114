pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports for convenience
pub use application::services::{
    picture_message, Base, Camera, Device, LevelTrigger, PictureMessage, PipelineSupervisor,
    RouterService,
};
pub use config::Config;
pub use domain::entities::{CameraLifecycle, StateTransition};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    ArloDevice, ChildProcess, MessageTransport, MetricsReporter, ProcessLauncher,
    TransportSession,
};
pub use domain::value_objects::{
    AttributeValue, BackoffPolicy, CameraSettings, CameraState, DeviceName, DeviceStatus,
    PipelineRole, TopicTemplates,
};
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
pub use infrastructure::mqtt::{MqttSettings, MqttTransport};
pub use infrastructure::process::{FfmpegLauncher, PipelineBuilder};
pub use infrastructure::sdk::LocalArloDevice;
