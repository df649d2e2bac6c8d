use async_trait::async_trait;
use parking_lot::Mutex;

use super::{OutboundTopic, Transport, TransportError};

/// A message captured by [`MemoryTransport`]
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Loopback transport that records every publish in order.
///
/// Used when running without a broker and by the integration tests.
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<PublishedMessage>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Messages published to exactly `topic`
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, topic: &OutboundTopic, payload: Vec<u8>) -> Result<(), TransportError> {
        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retained: topic.retained(),
        });
        Ok(())
    }
}
