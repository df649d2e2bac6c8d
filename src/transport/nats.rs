use anyhow::{Context, Result};
use async_nats::{Client, ConnectOptions, Event, HeaderMap};
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{InboundMessage, OutboundTopic, Transport, TransportError};
use crate::config::NatsConfig;

/// Subject covering every device topic (`device/{id}/...`)
const DEVICE_SUBJECTS: &str = "device.*.>";

/// Header carried by publishes that the broker side should retain
pub const RETAIN_HEADER: &str = "Nats-Retain";

/// NATS-backed transport.
///
/// Topics keep their slash-separated shape everywhere in the crate; only this
/// adapter maps them onto dot-separated NATS subjects.
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Connect to NATS server with the configured reconnect policy
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = connect_options(config)
            .connect(config.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Subscribe to every device topic.
    ///
    /// A pump task decodes each message and hands it to the returned bounded
    /// queue; malformed messages are logged and dropped there.
    pub async fn subscribe_devices(&self, capacity: usize) -> Result<mpsc::Receiver<InboundMessage>> {
        info!("Subscribing to device topics on {}", DEVICE_SUBJECTS);

        let mut subscriber = self
            .client
            .subscribe(DEVICE_SUBJECTS)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))
            .context("Failed to subscribe to device topics")?;

        let (tx, rx) = mpsc::channel(capacity);

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let topic = subject_to_topic(&msg.subject.to_string());

                let inbound = match InboundMessage::decode(&topic, &msg.payload) {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        warn!("Dropping message on {}: {}", topic, e);
                        continue;
                    }
                };

                if tx.send(inbound).await.is_err() {
                    info!("Inbound queue closed, stopping subscription pump");
                    break;
                }
            }

            info!("Device subscription ended");
        });

        Ok(rx)
    }

    /// Flush pending publishes before shutdown
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }
}

/// Client options: named connection, retry on first connect, bounded
/// reconnects with a capped linear delay
pub fn connect_options(config: &NatsConfig) -> ConnectOptions {
    let max_delay = Duration::from_millis(config.reconnect_delay_ms);

    ConnectOptions::new()
        .name(config.name.clone())
        .retry_on_initial_connect()
        .max_reconnects(config.max_reconnects)
        .reconnect_delay_callback(move |attempts| reconnect_delay(attempts, max_delay))
        .event_callback(|event| async move {
            match event {
                Event::Connected => info!("NATS connection established"),
                Event::Disconnected => warn!("NATS connection lost, reconnecting"),
                other => debug!("NATS event: {}", other),
            }
        })
}

/// 250ms per attempt, capped at `max_delay`
pub fn reconnect_delay(attempts: usize, max_delay: Duration) -> Duration {
    std::cmp::min(Duration::from_millis(250 * attempts as u64), max_delay)
}

#[async_trait]
impl Transport for NatsTransport {
    async fn publish(&self, topic: &OutboundTopic, payload: Vec<u8>) -> Result<(), TransportError> {
        let subject = topic_to_subject(&topic.to_string());

        let result = if topic.retained() {
            let mut headers = HeaderMap::new();
            headers.insert(RETAIN_HEADER, "true");
            self.client
                .publish_with_headers(subject, headers, payload.into())
                .await
        } else {
            self.client.publish(subject, payload.into()).await
        };

        result.map_err(|e| {
            error!("Failed to publish to {}: {}", topic, e);
            TransportError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// `server/d1/audio` -> `server.d1.audio`
pub fn topic_to_subject(topic: &str) -> String {
    topic.replace('/', ".")
}

/// `device.d1.stt.audio` -> `device/d1/stt/audio`
pub fn subject_to_topic(subject: &str) -> String {
    subject.replace('.', "/")
}
