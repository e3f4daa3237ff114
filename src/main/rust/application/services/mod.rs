mod base;
mod camera;
mod device;
mod event_bridge;
mod pipeline_supervisor;
mod router_service;
mod signal;
mod sinks;

pub use base::Base;
pub use camera::Camera;
pub use device::{run_event_loop, status_stream, Device};
pub use event_bridge::{event_channel, EventSink, EventStream};
pub use pipeline_supervisor::PipelineSupervisor;
pub use router_service::{picture_message, PictureMessage, RouterService};
pub use signal::LevelTrigger;
pub use sinks::{MotionSink, PictureQueue};
