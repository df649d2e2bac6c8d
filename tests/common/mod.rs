//! Scripted stand-ins for the speech services and reasoning backend

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use loqa_assist::agents::{AgentError, AgentRole, AgentSet, CapabilityAgent, TextStream};
use loqa_assist::config::{Config, DispatchConfig};
use loqa_assist::orchestrator::Orchestrator;
use loqa_assist::reassembly::CompletedStream;
use loqa_assist::speech::{SpeechError, SynthesizedAudio, Synthesizer, Transcriber};
use loqa_assist::{AssistantServer, AudioPublisher, MemoryTransport, SentenceDispatcher};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Agent that replays queued replies, then repeats a fallback
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<String, AgentError>>>,
    fallback: Result<String, AgentError>,
    fragments: Option<Vec<String>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.to_string()),
            fragments: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AgentError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::always("")
        }
    }

    /// Streams `fragments` one by one
    pub fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: Some(fragments.iter().map(|f| f.to_string()).collect()),
            ..Self::always(&fragments.concat())
        }
    }

    pub fn then(self, reply: Result<&str, AgentError>) -> Self {
        self.replies.lock().push_back(reply.map(str::to_string));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CapabilityAgent for ScriptedAgent {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    async fn complete_stream(&self, prompt: &str) -> Result<TextStream, AgentError> {
        match &self.fragments {
            Some(fragments) => {
                self.prompts.lock().push(prompt.to_string());
                let items: Vec<Result<String, AgentError>> =
                    fragments.iter().cloned().map(Ok).collect();
                let delay = self.delay;
                // With a delay, each fragment is paced by it
                Ok(Box::pin(futures::stream::iter(items).then(move |item| async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    item
                })))
            }
            None => {
                let text = self.complete(prompt).await?;
                Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
            }
        }
    }
}

/// Synthesizer that records every sentence it is asked to speak
#[derive(Default)]
pub struct RecordingSynthesizer {
    sentences: Mutex<Vec<String>>,
    audio_len: Option<usize>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `len` bytes of audio per sentence instead of the text bytes
    pub fn with_audio_len(len: usize) -> Self {
        Self {
            sentences: Mutex::new(Vec::new()),
            audio_len: Some(len),
        }
    }

    pub fn sentences(&self) -> Vec<String> {
        self.sentences.lock().clone()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
        self.sentences.lock().push(text.to_string());

        let audio = match self.audio_len {
            Some(len) => (0..len).map(|i| (i % 251) as u8).collect(),
            None => text.as_bytes().to_vec(),
        };

        Ok(SynthesizedAudio {
            audio,
            sample_rate: 22050,
            format: "mp3".to_string(),
        })
    }
}

/// Transcriber returning a fixed text and keeping the uploads it saw
pub struct FixedTranscriber {
    text: String,
    streams: Mutex<Vec<CompletedStream>>,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn streams(&self) -> Vec<CompletedStream> {
        self.streams.lock().clone()
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, stream: &CompletedStream) -> Result<String, SpeechError> {
        self.streams.lock().push(stream.clone());
        Ok(self.text.clone())
    }
}

/// Dispatcher publishing into `transport` without pacing delays
pub fn dispatcher(
    synthesizer: Arc<RecordingSynthesizer>,
    transport: Arc<MemoryTransport>,
) -> SentenceDispatcher {
    let config = DispatchConfig {
        max_chunk_delay_ms: 0,
        ..DispatchConfig::default()
    };
    let publisher = AudioPublisher::new(transport, &config);
    let (dispatcher, _task) = SentenceDispatcher::spawn(synthesizer, publisher, 16);
    dispatcher
}

/// Poll `check` until it holds, failing after five seconds
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Server wired to in-memory fakes
pub struct Fixture {
    pub server: Arc<AssistantServer>,
    pub transport: Arc<MemoryTransport>,
    pub transcriber: Arc<FixedTranscriber>,
    pub synthesizer: Arc<RecordingSynthesizer>,
    pub response: Arc<ScriptedAgent>,
    pub dir: tempfile::TempDir,
}

/// Build a server whose planner always answers directly with `reply`
pub fn fixture(transcript: &str, reply: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");

    let mut config = Config::default();
    config.service.device_logs_dir = dir.path().join("logs").to_string_lossy().into_owned();
    config.reassembly.recordings_dir = Some(dir.path().join("recordings").to_string_lossy().into_owned());

    let transport = Arc::new(MemoryTransport::new());
    let transcriber = Arc::new(FixedTranscriber::new(transcript));
    let synthesizer = Arc::new(RecordingSynthesizer::new());
    let response = Arc::new(ScriptedAgent::always(reply));

    let agents = AgentSet::uniform(response.clone())
        .with(AgentRole::Planner, Arc::new(ScriptedAgent::always("not json")));
    let orchestrator = Arc::new(Orchestrator::new(agents, config.orchestrator.clone()));

    let server = Arc::new(AssistantServer::new(
        &config,
        transport.clone(),
        transcriber.clone(),
        orchestrator,
        dispatcher(synthesizer.clone(), transport.clone()),
    ));

    Fixture {
        server,
        transport,
        transcriber,
        synthesizer,
        response,
        dir,
    }
}
