use crate::domain::value_objects::{CameraState, PipelineRole};

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_camera_state(&self, camera: &str, state: CameraState);
    fn report_pipeline_start(&self, role: PipelineRole);
    fn report_pipeline_restart(&self, role: PipelineRole);
    fn report_transport_state(&self, connected: bool);
    fn report_reconnect_attempt(&self);
    fn report_published(&self, category: &str);
    fn report_picture_dropped(&self, camera: &str);
}
