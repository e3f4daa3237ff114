use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::{CameraState, PipelineRole};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Camera state per camera (0=idle, 1=streaming)
    pub static ref CAMERA_STATE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("arlo_camera_state", "Current camera state"),
        &["camera"]
    ).expect("metric can be created");

    pub static ref PIPELINE_STARTS: IntCounterVec = IntCounterVec::new(
        Opts::new("arlo_pipeline_starts_total", "Total number of pipeline launches"),
        &["role"]
    ).expect("metric can be created");

    pub static ref PIPELINE_RESTARTS: IntCounterVec = IntCounterVec::new(
        Opts::new("arlo_pipeline_restarts_total", "Total number of pipeline restarts after a failure"),
        &["role"]
    ).expect("metric can be created");

    // Transport state (0=disconnected, 1=connected)
    pub static ref TRANSPORT_STATE: IntGauge = IntGauge::new(
        "arlo_mqtt_connection_state",
        "MQTT connection state"
    ).expect("metric can be created");

    pub static ref RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "arlo_mqtt_reconnect_attempts_total",
        "Total number of MQTT reconnection attempts"
    ).expect("metric can be created");

    pub static ref PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("arlo_mqtt_published_total", "Total number of published messages"),
        &["category"]
    ).expect("metric can be created");

    pub static ref PICTURES_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("arlo_pictures_dropped_total", "Pictures dropped because the queue was full"),
        &["camera"]
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(CAMERA_STATE.clone()))?;
        REGISTRY.register(Box::new(PIPELINE_STARTS.clone()))?;
        REGISTRY.register(Box::new(PIPELINE_RESTARTS.clone()))?;
        REGISTRY.register(Box::new(TRANSPORT_STATE.clone()))?;
        REGISTRY.register(Box::new(RECONNECT_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(PUBLISHED.clone()))?;
        REGISTRY.register(Box::new(PICTURES_DROPPED.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_camera_state(&self, camera: &str, state: CameraState) {
        CAMERA_STATE.with_label_values(&[camera]).set(state.as_metric());
    }

    fn report_pipeline_start(&self, role: PipelineRole) {
        PIPELINE_STARTS.with_label_values(&[role.as_str()]).inc();
    }

    fn report_pipeline_restart(&self, role: PipelineRole) {
        PIPELINE_RESTARTS.with_label_values(&[role.as_str()]).inc();
    }

    fn report_transport_state(&self, connected: bool) {
        TRANSPORT_STATE.set(if connected { 1 } else { 0 });
    }

    fn report_reconnect_attempt(&self) {
        RECONNECT_ATTEMPTS.inc();
    }

    fn report_published(&self, category: &str) {
        PUBLISHED.with_label_values(&[category]).inc();
    }

    fn report_picture_dropped(&self, camera: &str) {
        PICTURES_DROPPED.with_label_values(&[camera]).inc();
    }
}
