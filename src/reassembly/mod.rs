//! Chunked upload reassembly
//!
//! Devices upload an utterance as numbered base64 chunks. The reassembler
//! buffers them per `(device, stream)` until the upload completes or sits idle
//! past the session timeout.

mod session;

pub use session::{CompletedStream, IncomingChunk, StreamKey};

use base64::Engine;
use parking_lot::Mutex;
use session::AudioStreamSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ReassemblyConfig;
use crate::transport::{AudioChunkMessage, DecodeError};

impl IncomingChunk {
    /// Decode the base64 payload of a device chunk message
    pub fn from_message(device_id: &str, msg: &AudioChunkMessage) -> Result<Self, DecodeError> {
        let payload = base64::engine::general_purpose::STANDARD.decode(msg.data.as_bytes())?;

        Ok(Self {
            device_id: device_id.to_string(),
            stream_id: msg.stream_id.clone(),
            chunk_index: msg.chunk_index,
            total_chunks: msg.total_chunks,
            is_last: msg.is_last,
            format: msg.format.clone(),
            sample_rate: msg.sample_rate,
            payload,
        })
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<StreamKey, AudioStreamSession>,
    /// Recently completed uploads, so late re-deliveries are not answered twice
    completed: HashMap<StreamKey, Instant>,
}

/// Owns every in-flight upload.
///
/// The map is shared with the sweeper task; both sides only touch it through
/// [`accept`](Self::accept) and [`sweep_expired`](Self::sweep_expired).
pub struct StreamReassembler {
    inner: Mutex<Inner>,
    session_timeout: Duration,
}

impl StreamReassembler {
    pub fn new(config: &ReassemblyConfig) -> Self {
        Self::with_timeout(config.session_timeout())
    }

    pub fn with_timeout(session_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            session_timeout,
        }
    }

    /// Buffer one chunk.
    ///
    /// Returns the combined upload once `is_last` is seen or every declared
    /// chunk has arrived; the session is removed at that point. Chunks of an
    /// upload completed within the session timeout are dropped.
    pub fn accept(&self, chunk: IncomingChunk) -> Option<CompletedStream> {
        let key = StreamKey::new(&chunk.device_id, &chunk.stream_id);
        let now = Instant::now();

        let finished = {
            let mut inner = self.inner.lock();
            if inner.completed.contains_key(&key) {
                debug!(
                    "Dropping late chunk {} of completed stream {} from {}",
                    chunk.chunk_index, key.stream_id, key.device_id
                );
                return None;
            }

            let session = inner
                .sessions
                .entry(key.clone())
                .or_insert_with(|| AudioStreamSession::new(&chunk, now));

            session.store(chunk.chunk_index, chunk.payload, now);

            debug!(
                "Received audio chunk {}/{} from {} (stream: {})",
                chunk.chunk_index + 1,
                session.total_chunks(),
                key.device_id,
                key.stream_id
            );

            if chunk.is_last || session.is_full() {
                inner.completed.insert(key.clone(), now);
                inner.sessions.remove(&key)
            } else {
                None
            }
        }?;

        info!(
            "Completed audio stream {} from {} ({} of {} chunks)",
            key.stream_id,
            key.device_id,
            finished.received_count(),
            finished.total_chunks()
        );

        let out_of_range = finished.out_of_range();
        if out_of_range > 0 {
            warn!(
                "Ignoring {} chunk(s) beyond the declared total in stream {} from {}",
                out_of_range, key.stream_id, key.device_id
            );
        }

        let completed = finished.into_completed(key);
        for index in &completed.missing {
            warn!(
                "Missing chunk {} in stream {} from {}",
                index, completed.stream_id, completed.device_id
            );
        }

        Some(completed)
    }

    /// Drop uploads idle for longer than the session timeout
    pub fn sweep_expired(&self) -> Vec<StreamKey> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut inner = self.inner.lock();

        inner.sessions.retain(|key, session| {
            if session.idle_for(now) > self.session_timeout {
                expired.push(key.clone());
                false
            } else {
                true
            }
        });
        inner
            .completed
            .retain(|_, at| now.saturating_duration_since(*at) <= self.session_timeout);
        drop(inner);

        for key in &expired {
            warn!(
                "Audio stream {} from {} timed out, cleaning up",
                key.stream_id, key.device_id
            );
        }

        expired
    }

    /// Number of uploads currently buffered
    pub fn active_streams(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Chunks received so far for one upload, if it is still in flight
    pub fn received_count(&self, key: &StreamKey) -> Option<u32> {
        self.inner.lock().sessions.get(key).map(|s| s.received_count())
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval`
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let reassembler = Arc::clone(self);

        tokio::spawn(async move {
            info!("Audio stream sweeper started (every {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                reassembler.sweep_expired();
            }
        })
    }
}
