use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

/// Identifies one upload: the same stream id may be reused by different devices
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub device_id: String,
    pub stream_id: String,
}

impl StreamKey {
    pub fn new(device_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            stream_id: stream_id.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.device_id, self.stream_id)
    }
}

/// One chunk of an upload, already base64-decoded
#[derive(Debug, Clone)]
pub struct IncomingChunk {
    pub device_id: String,
    pub stream_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub is_last: bool,
    pub format: String,
    pub sample_rate: u32,
    pub payload: Vec<u8>,
}

/// A fully received (or best-effort) upload handed to transcription
#[derive(Debug, Clone)]
pub struct CompletedStream {
    pub device_id: String,
    pub stream_id: String,
    /// Chunks concatenated in index order
    pub audio: Vec<u8>,
    pub format: String,
    pub sample_rate: u32,
    pub total_chunks: u32,
    /// Indices below `total_chunks` that never arrived
    pub missing: Vec<u32>,
}

impl CompletedStream {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// In-flight reassembly state for one upload
#[derive(Debug)]
pub(crate) struct AudioStreamSession {
    chunks: HashMap<u32, Vec<u8>>,
    total_chunks: u32,
    received_count: u32,
    format: String,
    sample_rate: u32,
    last_activity: Instant,
}

impl AudioStreamSession {
    pub(crate) fn new(chunk: &IncomingChunk, now: Instant) -> Self {
        Self {
            chunks: HashMap::new(),
            total_chunks: chunk.total_chunks.max(1),
            received_count: 0,
            format: chunk.format.clone(),
            sample_rate: chunk.sample_rate,
            last_activity: now,
        }
    }

    /// Store a chunk; re-delivery of an index replaces the bytes without counting twice
    pub(crate) fn store(&mut self, index: u32, payload: Vec<u8>, now: Instant) {
        if self.chunks.insert(index, payload).is_none() {
            self.received_count += 1;
        }
        self.last_activity = now;
    }

    pub(crate) fn received_count(&self) -> u32 {
        self.received_count
    }

    pub(crate) fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub(crate) fn is_full(&self) -> bool {
        self.received_count >= self.total_chunks
    }

    pub(crate) fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Concatenate chunks `0..total_chunks`, skipping (and reporting) gaps
    pub(crate) fn into_completed(mut self, key: StreamKey) -> CompletedStream {
        let mut audio = Vec::new();
        let mut missing = Vec::new();

        for index in 0..self.total_chunks {
            match self.chunks.remove(&index) {
                Some(bytes) => audio.extend_from_slice(&bytes),
                None => missing.push(index),
            }
        }

        CompletedStream {
            device_id: key.device_id,
            stream_id: key.stream_id,
            audio,
            format: self.format,
            sample_rate: self.sample_rate,
            total_chunks: self.total_chunks,
            missing,
        }
    }

    /// Indices stored beyond the declared total; ignored on completion
    pub(crate) fn out_of_range(&self) -> usize {
        self.chunks.keys().filter(|&&i| i >= self.total_chunks).count()
    }
}
