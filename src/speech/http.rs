use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{SpeechError, SynthesizedAudio, Synthesizer, Transcriber};
use crate::audio::{format_from_content_type, sample_rate_of, upload_file, PCM16LE};
use crate::config::SpeechConfig;
use crate::reassembly::CompletedStream;

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct HttpTranscriber {
    client: Client,
    base_url: String,
    model: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl HttpTranscriber {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.stt_base_url.trim_end_matches('/').to_string(),
            model: config.stt_model.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, stream: &CompletedStream) -> Result<String, SpeechError> {
        let (bytes, file_name) =
            upload_file(stream).map_err(|e| SpeechError::Audio(e.to_string()))?;

        debug!(
            "Transcribing {} bytes from {} (stream: {})",
            bytes.len(),
            stream.device_id,
            stream.stream_id
        );

        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text.trim().to_string())
    }
}

/// Client for an OpenAI-compatible `/audio/speech` endpoint
pub struct HttpSynthesizer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    voice: String,
    speed: f32,
    default_sample_rate: u32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

impl HttpSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            api_key: config.tts_api_key.clone(),
            model: config.tts_model.clone(),
            voice: config.voice.clone(),
            speed: config.speed,
            default_sample_rate: config.default_sample_rate,
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
        info!("Generating TTS for '{}'", text);

        let mut request = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.speed,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(format_from_content_type)
            .unwrap_or("mp3")
            .to_string();

        let audio = response.bytes().await?.to_vec();

        let sample_rate = if format == PCM16LE {
            self.default_sample_rate
        } else {
            sample_rate_of(&audio, Some(&format)).unwrap_or(self.default_sample_rate)
        };

        debug!(
            "Synthesized {} bytes of {} at {} Hz",
            audio.len(),
            format,
            sample_rate
        );

        Ok(SynthesizedAudio {
            audio,
            sample_rate,
            format,
        })
    }
}
