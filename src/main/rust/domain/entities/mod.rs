mod camera_lifecycle;

pub use camera_lifecycle::{CameraLifecycle, StateTransition};
