use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, Mutex};
use tokio_util::task::AbortOnDropHandle;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{InboundMessage, MessageTransport, TransportSession};

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 64;

/// Broker connection parameters
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            client_id: format!("arlo-streamer-{}", std::process::id()),
            keep_alive: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        if !self.username.is_empty() {
            options.set_credentials(&self.username, &self.password);
        }
        options
    }
}

/// MQTT transport; every `connect` opens a fresh broker session
pub struct MqttTransport {
    settings: MqttSettings,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl MessageTransport for MqttTransport {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>> {
        let (client, mut event_loop) = AsyncClient::new(self.settings.options(), REQUEST_CAPACITY);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(_) => continue,
                Err(e) => return Err(DomainError::Transport(e.to_string())),
            }
        }
        tracing::info!("MQTT client connected to {}:{}", self.settings.host, self.settings.port);

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let driver = AbortOnDropHandle::new(tokio::spawn(drive(event_loop, tx)));

        Ok(Arc::new(MqttSession {
            client,
            inbound: Mutex::new(rx),
            _driver: driver,
        }))
    }
}

/// Poll the event loop, forwarding inbound publishes. Stops at the first
/// connection error so the session is rebuilt from scratch.
async fn drive(mut event_loop: EventLoop, tx: mpsc::Sender<Result<InboundMessage>>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if tx.send(Ok(message)).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                let _ = tx.send(Err(DomainError::Transport(e.to_string()))).await;
                break;
            }
        }
    }
}

struct MqttSession {
    client: AsyncClient,
    inbound: Mutex<mpsc::Receiver<Result<InboundMessage>>>,
    _driver: AbortOnDropHandle<()>,
}

#[async_trait]
impl TransportSession for MqttSession {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))
    }

    async fn next_message(&self) -> Result<InboundMessage> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(DomainError::TransportClosed))
    }
}
