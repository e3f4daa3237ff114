use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{status_stream, Base, Camera, Device};
use crate::domain::errors::Result;
use crate::domain::ports::{MessageTransport, MetricsReporter, TransportSession};
use crate::domain::value_objects::{BackoffPolicy, DeviceName, TopicTemplates};

/// Payload of the picture topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureMessage {
    pub filename: String,
    /// Base64 encoded JPEG
    pub payload: String,
}

/// Wrap a snapshot for publishing. The file name is `<epoch micros><name>.jpg`.
pub fn picture_message(name: &DeviceName, picture: &[u8], now: SystemTime) -> PictureMessage {
    let epoch = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    PictureMessage {
        filename: format!("{}{}.jpg", epoch, name),
        payload: STANDARD.encode(picture),
    }
}

/// An outbound message ready for the transport
type Outbound = (String, Vec<u8>);

/// Application service bridging devices and the message transport.
///
/// Fans per-device status, motion and picture sequences out to their topics
/// and fans control messages in to the owning device. The whole session is
/// torn down and rebuilt when the transport fails.
pub struct RouterService {
    transport: Arc<dyn MessageTransport>,
    topics: TopicTemplates,
    backoff_policy: BackoffPolicy,
    cameras: Vec<Arc<Camera>>,
    devices: Vec<Arc<dyn Device>>,
    controls: HashMap<String, Arc<dyn Device>>,
    metrics: Arc<dyn MetricsReporter>,
    shutdown: CancellationToken,
}

impl RouterService {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        topics: TopicTemplates,
        backoff_policy: BackoffPolicy,
        cameras: Vec<Arc<Camera>>,
        bases: Vec<Arc<Base>>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        let devices: Vec<Arc<dyn Device>> = cameras
            .iter()
            .map(|c| c.clone() as Arc<dyn Device>)
            .chain(bases.into_iter().map(|b| b as Arc<dyn Device>))
            .collect();
        let controls = devices
            .iter()
            .map(|d| (topics.control(d.name().as_str()), d.clone()))
            .collect();

        Self {
            transport,
            topics,
            backoff_policy,
            cameras,
            devices,
            controls,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    /// Topics subscribed on every (re)connect
    pub fn control_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.controls.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Run sessions until [`stop`](Self::stop) is called, reconnecting after failures
    pub async fn run_with_reconnect(&self) {
        let mut current_backoff = self.backoff_policy.initial_delay();
        let mut reconnect_attempt = 0u32;

        loop {
            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                connected = self.transport.connect() => connected,
            };

            match connected {
                Ok(session) => {
                    tracing::info!("Transport connected");
                    self.metrics.report_transport_state(true);

                    // Reset backoff on successful connect
                    current_backoff = self.backoff_policy.initial_delay();
                    reconnect_attempt = 0;

                    let outcome = tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        outcome = self.run_session(session) => outcome,
                    };
                    match outcome {
                        Ok(()) => tracing::info!("Transport session ended"),
                        Err(e) => tracing::error!("Transport session failed: {}", e),
                    }
                }
                Err(e) => tracing::error!("Transport connection failed: {}", e),
            }

            reconnect_attempt += 1;
            self.metrics.report_transport_state(false);
            self.metrics.report_reconnect_attempt();
            tracing::info!(
                "Reconnecting in {:?} (attempt {})...",
                current_backoff,
                reconnect_attempt
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(current_backoff) => {}
            }
            current_backoff = self.backoff_policy.next_delay(current_backoff);
        }

        self.metrics.report_transport_state(false);
        tracing::info!("Router stopped");
    }

    /// Stop the reconnect loop and the running session
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// One connected session: the command reader plus the three publishing
    /// loops. The first failure tears the others down.
    async fn run_session(&self, session: Arc<dyn TransportSession>) -> Result<()> {
        tokio::try_join!(
            self.read_commands(session.as_ref()),
            publish_all(session.as_ref(), self.status_messages(), "status", self.metrics.as_ref()),
            publish_all(session.as_ref(), self.motion_messages(), "motion", self.metrics.as_ref()),
            publish_all(session.as_ref(), self.picture_messages(), "picture", self.metrics.as_ref()),
        )?;
        Ok(())
    }

    async fn read_commands(&self, session: &dyn TransportSession) -> Result<()> {
        for topic in self.control_topics() {
            session.subscribe(&topic).await?;
            tracing::debug!("Subscribed to {}", topic);
        }

        loop {
            let message = session.next_message().await?;
            let Some(device) = self.controls.get(&message.topic) else {
                tracing::debug!("Message on unknown topic {} ignored", message.topic);
                continue;
            };

            let payload = String::from_utf8_lossy(&message.payload).into_owned();
            tracing::info!(device = %device.name(), "control: {}", payload);
            let device = device.clone();
            tokio::spawn(async move {
                device.mqtt_control(&payload).await;
            });
        }
    }

    fn status_messages(&self) -> BoxStream<'static, Outbound> {
        let topics = self.topics.clone();
        let statuses = self
            .devices
            .iter()
            .map(|device| status_stream(device.clone()).boxed());

        stream::select_all(statuses)
            .filter_map(move |(name, status)| {
                let message = match status.to_json() {
                    Ok(payload) => Some((topics.status(name.as_str()), payload)),
                    Err(e) => {
                        tracing::warn!(device = %name, "Status not serializable: {}", e);
                        None
                    }
                };
                futures::future::ready(message)
            })
            .boxed()
    }

    fn motion_messages(&self) -> BoxStream<'static, Outbound> {
        let topics = self.topics.clone();
        let motions = self.cameras.iter().map(|camera| camera.motion_stream().boxed());

        stream::select_all(motions)
            .map(move |(name, motion)| {
                let payload = if motion { b"true".to_vec() } else { b"false".to_vec() };
                (topics.motion(name.as_str()), payload)
            })
            .boxed()
    }

    fn picture_messages(&self) -> BoxStream<'static, Outbound> {
        let topics = self.topics.clone();
        let pictures = self.cameras.iter().map(|camera| camera.pictures().boxed());

        stream::select_all(pictures)
            .filter_map(move |(name, picture)| {
                let message = picture_message(&name, &picture, SystemTime::now());
                let message = match serde_json::to_vec(&message) {
                    Ok(payload) => Some((topics.picture(name.as_str()), payload)),
                    Err(e) => {
                        tracing::warn!(camera = %name, "Picture not serializable: {}", e);
                        None
                    }
                };
                futures::future::ready(message)
            })
            .boxed()
    }
}

/// Publish every item of `messages` until the transport fails
async fn publish_all(
    session: &dyn TransportSession,
    mut messages: BoxStream<'static, Outbound>,
    category: &str,
    metrics: &dyn MetricsReporter,
) -> Result<()> {
    while let Some((topic, payload)) = messages.next().await {
        tracing::debug!("publish {}", topic);
        session.publish(&topic, payload).await?;
        metrics.report_published(category);
    }
    // Only an empty device list ends a merged sequence
    tracing::debug!("No {} sources", category);
    std::future::pending().await
}
