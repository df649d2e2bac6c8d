//! Speech-to-text and text-to-speech seams
//!
//! The engines themselves live outside this service; the server only needs
//! `transcribe(audio) -> text` and `synthesize(text) -> audio`.

mod http;

pub use http::{HttpSynthesizer, HttpTranscriber};

use async_trait::async_trait;
use thiserror::Error;

use crate::reassembly::CompletedStream;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("speech service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to prepare audio: {0}")]
    Audio(String),
}

/// Encoded speech ready to be chunked out to a device
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    /// Short format name ("mp3", "wav", "pcm16le", ...)
    pub format: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Convert an uploaded utterance to text
    async fn transcribe(&self, stream: &CompletedStream) -> Result<String, SpeechError>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Convert one sentence to audio
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SpeechError>;
}
