mod mqtt_transport;

pub use mqtt_transport::{MqttSettings, MqttTransport};
