use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Port for the publish/subscribe transport
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Open a new session; each reconnect gets a fresh one
    async fn connect(&self) -> Result<Arc<dyn TransportSession>>;
}

/// One connected transport session, shared by the publishing loops and the reader
#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<()>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Next inbound message. An error means the session is gone.
    async fn next_message(&self) -> Result<InboundMessage>;
}
