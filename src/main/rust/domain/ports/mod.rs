mod arlo_device;
mod message_transport;
mod metrics_reporter;
mod process_launcher;

pub use arlo_device::{ArloDevice, AttributeCallback};
pub use message_transport::{InboundMessage, MessageTransport, TransportSession};
pub use metrics_reporter::MetricsReporter;
pub use process_launcher::{ChildProcess, ProcessLauncher};
