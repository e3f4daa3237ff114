mod attribute_event;
mod backoff_policy;
mod camera_settings;
mod camera_state;
mod command;
mod device_name;
mod device_status;
mod pipeline_spec;
mod topic_templates;

pub use attribute_event::{AttributeEvent, AttributeValue};
pub use backoff_policy::BackoffPolicy;
pub use camera_settings::CameraSettings;
pub use camera_state::CameraState;
pub use command::{BaseCommand, CameraCommand, SirenArgs, SirenCommand};
pub use device_name::DeviceName;
pub use device_status::{BaseStatus, CameraStatus, DeviceStatus};
pub use pipeline_spec::{
    PipelineExit, PipelineRole, PipelineSet, PipelineSpec, Redirect, STREAM_URL_PLACEHOLDER,
};
pub use topic_templates::TopicTemplates;
