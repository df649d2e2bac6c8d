//! Publish/subscribe transport between devices and the server
//!
//! Devices and the server exchange JSON messages over slash-separated topics
//! (`device/{id}/...` inbound, `server/{id}/...` outbound). This module owns:
//! - The typed topic table ([`InboundKind`], [`OutboundTopic`])
//! - Wire payloads ([`messages`])
//! - The [`Transport`] seam with a NATS adapter and an in-memory loopback

pub mod memory;
pub mod messages;
pub mod nats;
pub mod topics;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use memory::{MemoryTransport, PublishedMessage};
pub use messages::{
    AudioChunkMessage, DeviceLogMessage, DeviceStatusNotice, InfoMessage, PingMessage,
    PongMessage, ServerAudioChunk, ServerStatusMessage, StatusMessage,
};
pub use nats::NatsTransport;
pub use topics::{InboundKind, InboundMessage, InboundPayload, OutboundTopic};

/// Errors raised while turning a raw transport message into an [`InboundMessage`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no handler for topic {0}")]
    UnknownTopic(String),

    #[error("malformed payload on {topic}: {source}")]
    MalformedPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base64 audio data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Errors raised while publishing
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode payload for {topic}: {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("failed to subscribe: {0}")]
    Subscribe(String),
}

/// Outbound half of the pub/sub connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a raw payload; retention follows [`OutboundTopic::retained`]
    async fn publish(&self, topic: &OutboundTopic, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// Serialize `message` as JSON and publish it
pub async fn publish_json<T: Serialize + ?Sized>(
    transport: &dyn Transport,
    topic: &OutboundTopic,
    message: &T,
) -> Result<(), TransportError> {
    let payload = serde_json::to_vec(message).map_err(|source| TransportError::Encode {
        topic: topic.to_string(),
        source,
    })?;

    transport.publish(topic, payload).await
}
