use std::time::Duration;

use clap::Parser;

use crate::domain::errors::Result;
use crate::domain::value_objects::{BackoffPolicy, CameraSettings, TopicTemplates};

/// Broker name that disables the transport
pub const FAKE_BROKER: &str = "fake";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "arlo-streamer",
    version = "0.1.0",
    about = "Arlo camera streamer with MQTT status, motion, picture and control topics"
)]
pub struct Config {
    /// MQTT broker host ("fake" runs without a broker)
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    pub mqtt_broker: String,

    #[arg(long, env = "MQTT_PORT", default_value = "1883")]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_USER", default_value = "arlo")]
    pub mqtt_user: String,

    #[arg(long, env = "MQTT_PASS", default_value = "arlo", hide_env_values = true)]
    pub mqtt_pass: String,

    /// Delay in seconds before reconnecting to the broker
    #[arg(long, env = "MQTT_RECONNECT_INTERVAL", default_value = "5")]
    pub mqtt_reconnect_interval: u64,

    #[arg(long, env = "MQTT_TOPIC_STATUS", default_value = "arlo/status/{name}")]
    pub mqtt_topic_status: String,

    #[arg(long, env = "MQTT_TOPIC_MOTION", default_value = "arlo/motion/{name}")]
    pub mqtt_topic_motion: String,

    #[arg(long, env = "MQTT_TOPIC_PICTURE", default_value = "arlo/picture/{name}")]
    pub mqtt_topic_picture: String,

    #[arg(long, env = "MQTT_TOPIC_CONTROL", default_value = "arlo/control/{name}")]
    pub mqtt_topic_control: String,

    /// Output arguments of the proxy relay; {name} is the camera name
    #[arg(long, env = "FFMPEG_OUT", default_value = "")]
    pub ffmpeg_out: String,

    /// Video looped while no camera stream is active
    #[arg(long, env = "IDLE_VIDEO", default_value = "idle.mp4")]
    pub idle_video: String,

    /// Seconds without motion before a camera returns to idle
    #[arg(long, env = "MOTION_TIMEOUT", default_value = "60")]
    pub motion_timeout: u64,

    /// Seconds between periodic status publications
    #[arg(long, env = "STATUS_INTERVAL", default_value = "120")]
    pub status_interval: u64,

    /// Seconds before restarting a crashed pipeline
    #[arg(long = "restart-delay", env = "PIPELINE_RESTART_DELAY", default_value = "3")]
    pub restart_delay: u64,

    #[arg(long, env = "PICTURE_QUEUE_SIZE", default_value = "10")]
    pub picture_queue_size: usize,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9102")]
    pub metrics_port: u16,

    /// Camera display names
    #[arg(long = "camera", env = "CAMERAS", value_delimiter = ',')]
    pub cameras: Vec<String>,

    /// Base station display names
    #[arg(long = "base", env = "BASES", value_delimiter = ',')]
    pub bases: Vec<String>,

    /// Base station modes
    #[arg(long = "mode", env = "BASE_MODES", value_delimiter = ',', default_value = "armed,disarmed")]
    pub modes: Vec<String>,

    /// Live stream URL handed out for a camera; {name} is the camera name
    #[arg(long, env = "STREAM_URL", default_value = "")]
    pub stream_url: String,

    /// Enable verbose logging and pipeline diagnostics
    #[arg(short, long, env = "DEBUG")]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mqtt_broker.is_empty() {
            anyhow::bail!("MQTT broker cannot be empty");
        }

        if self.mqtt_port == 0 {
            anyhow::bail!("Invalid MQTT port: port cannot be 0");
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        for (value, name) in [
            (self.mqtt_reconnect_interval, "MQTT reconnect interval"),
            (self.motion_timeout, "motion timeout"),
            (self.status_interval, "status interval"),
        ] {
            if value == 0 {
                anyhow::bail!("{} cannot be 0", name);
            }
        }

        if self.picture_queue_size == 0 {
            anyhow::bail!("Picture queue size cannot be 0");
        }

        self.to_topic_templates()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn transport_enabled(&self) -> bool {
        self.mqtt_broker != FAKE_BROKER
    }

    /// Stream URL for `camera`, `None` when no template is configured
    pub fn stream_url_for(&self, camera: &str) -> Option<String> {
        if self.stream_url.is_empty() {
            return None;
        }
        Some(self.stream_url.replace("{name}", camera))
    }

    pub fn to_backoff_policy(&self) -> Result<BackoffPolicy> {
        BackoffPolicy::fixed(Duration::from_secs(self.mqtt_reconnect_interval))
    }

    pub fn to_topic_templates(&self) -> Result<TopicTemplates> {
        TopicTemplates::new(
            self.mqtt_topic_status.clone(),
            self.mqtt_topic_motion.clone(),
            self.mqtt_topic_picture.clone(),
            self.mqtt_topic_control.clone(),
        )
    }

    pub fn camera_settings(&self) -> Result<CameraSettings> {
        CameraSettings::new(
            Duration::from_secs(self.motion_timeout),
            Duration::from_secs(self.status_interval),
            Duration::from_secs(self.restart_delay),
            self.picture_queue_size,
        )
    }
}
