use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::speech::SynthesizedAudio;
use crate::transport::messages::now_millis;
use crate::transport::{publish_json, OutboundTopic, ServerAudioChunk, Transport, TransportError};

/// Splits synthesized audio into fixed-size chunks and paces them out to a device
#[derive(Clone)]
pub struct AudioPublisher {
    transport: Arc<dyn Transport>,
    chunk_size: usize,
    max_delay: Duration,
}

impl AudioPublisher {
    pub fn new(transport: Arc<dyn Transport>, config: &DispatchConfig) -> Self {
        Self {
            transport,
            chunk_size: config.chunk_size.max(1),
            max_delay: Duration::from_millis(config.max_chunk_delay_ms),
        }
    }

    /// Publish `audio` to `server/{device}/audio`; returns the number of chunks sent
    pub async fn send(&self, device_id: &str, audio: &SynthesizedAudio) -> Result<u32, TransportError> {
        if audio.audio.is_empty() {
            warn!("Skipping empty audio for device {}", device_id);
            return Ok(0);
        }

        let stream_id = new_stream_id();
        let total_chunks = audio.audio.len().div_ceil(self.chunk_size) as u32;
        let delay = std::cmp::min(self.max_delay, Duration::from_secs(1) / total_chunks);
        let topic = OutboundTopic::Audio(device_id.to_string());

        info!(
            "Sending audio to device {}, total chunks: {}, total size: {} bytes",
            device_id,
            total_chunks,
            audio.audio.len()
        );

        for (index, data) in audio.audio.chunks(self.chunk_size).enumerate() {
            let index = index as u32;
            let chunk = ServerAudioChunk {
                stream_id: stream_id.clone(),
                server_stream_id: stream_id.clone(),
                chunk_index: index,
                total_chunks,
                is_last: index + 1 == total_chunks,
                timestamp: now_millis(),
                format: audio.format.clone(),
                sample_rate: audio.sample_rate,
                data: base64::engine::general_purpose::STANDARD.encode(data),
            };

            publish_json(self.transport.as_ref(), &topic, &chunk).await?;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        info!("Sent {} audio chunks to device {}", total_chunks, device_id);

        Ok(total_chunks)
    }
}

fn new_stream_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("server_{}_{}", now_millis(), &suffix[..8])
}
