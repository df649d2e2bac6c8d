//! Inbound message handling
//!
//! [`AssistantServer`] consumes decoded device messages from the transport
//! pump and routes each kind to its owner: audio chunks to the reassembler,
//! liveness traffic to the device store, logs to disk. A completed upload is
//! answered on its own task: transcribe, orchestrate, speak.

mod commands;
mod device_log;

pub use commands::{send_command, CommandError, CommandRequest, DeviceCommand};
pub use device_log::DeviceLogWriter;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::save_upload;
use crate::config::Config;
use crate::devices::DeviceSessionStore;
use crate::dispatch::SentenceDispatcher;
use crate::orchestrator::Orchestrator;
use crate::reassembly::{CompletedStream, IncomingChunk, StreamReassembler};
use crate::speech::Transcriber;
use crate::transport::messages::now_millis;
use crate::transport::{
    publish_json, InboundMessage, InboundPayload, OutboundTopic, PongMessage, ServerStatusMessage,
    Transport, TransportError,
};

pub struct AssistantServer {
    server_id: String,
    transport: Arc<dyn Transport>,
    reassembler: Arc<StreamReassembler>,
    devices: Arc<DeviceSessionStore>,
    dispatcher: SentenceDispatcher,
    orchestrator: Arc<Orchestrator>,
    transcriber: Arc<dyn Transcriber>,
    device_logs: DeviceLogWriter,
    recordings_dir: Option<PathBuf>,
}

impl AssistantServer {
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        transcriber: Arc<dyn Transcriber>,
        orchestrator: Arc<Orchestrator>,
        dispatcher: SentenceDispatcher,
    ) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        Self {
            server_id: format!("server-{}", &suffix[..8]),
            transport,
            reassembler: Arc::new(StreamReassembler::new(&config.reassembly)),
            devices: Arc::new(DeviceSessionStore::new(&config.devices)),
            dispatcher,
            orchestrator,
            transcriber,
            device_logs: DeviceLogWriter::new(&config.service.device_logs_dir),
            recordings_dir: config.reassembly.recordings_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn reassembler(&self) -> &Arc<StreamReassembler> {
        &self.reassembler
    }

    pub fn devices(&self) -> &Arc<DeviceSessionStore> {
        &self.devices
    }

    pub fn dispatcher(&self) -> &SentenceDispatcher {
        &self.dispatcher
    }

    /// Handle inbound messages until the channel closes
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("Server {} handling device messages", self.server_id);

        while let Some(message) = inbound.recv().await {
            self.handle(message).await;
        }

        info!("Inbound channel closed");
    }

    /// Route one message. Returns the task answering a completed upload, if
    /// this message completed one.
    pub async fn handle(self: &Arc<Self>, message: InboundMessage) -> Option<JoinHandle<()>> {
        debug!("Inbound {:?} from {}", message.kind(), message.device_id);
        let InboundMessage { device_id, payload } = message;

        match payload {
            InboundPayload::Audio(chunk) => {
                let chunk = match IncomingChunk::from_message(&device_id, &chunk) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Dropping audio chunk from {}: {}", device_id, e);
                        return None;
                    }
                };

                let completed = self.reassembler.accept(chunk)?;
                let server = Arc::clone(self);
                return Some(tokio::spawn(server.handle_utterance(completed)));
            }
            InboundPayload::Ping(_) => {
                self.devices.on_ping(&device_id);
                let pong = PongMessage {
                    data: "pong".to_string(),
                    ts: now_millis(),
                };
                let topic = OutboundTopic::Pong(device_id.clone());
                if let Err(e) = publish_json(self.transport.as_ref(), &topic, &pong).await {
                    error!("Failed to send pong to {}: {}", device_id, e);
                }
            }
            InboundPayload::Info(info) => {
                self.devices.on_info(&device_id, info.battery, info.gps);
            }
            InboundPayload::Status(status) => {
                self.devices.on_status(&device_id, &status.status);
            }
            InboundPayload::Log(entry) => {
                if let Err(e) = self.device_logs.append(&device_id, &entry).await {
                    error!("Failed to store log from {}: {:#}", device_id, e);
                }
            }
        }

        None
    }

    /// Transcribe a completed upload and speak the answer back
    pub async fn handle_utterance(self: Arc<Self>, stream: CompletedStream) {
        let device_id = stream.device_id.clone();

        let stream = match self.recordings_dir.clone() {
            Some(dir) => {
                // File and WAV encoding are blocking; hand the buffer over and back
                let saved = tokio::task::spawn_blocking(move || {
                    let result = save_upload(&dir, &stream);
                    (stream, result)
                })
                .await;

                match saved {
                    Ok((stream, Ok(_))) => stream,
                    Ok((stream, Err(e))) => {
                        warn!("Failed to save upload from {}: {:#}", device_id, e);
                        stream
                    }
                    Err(e) => {
                        error!("Saving upload from {} panicked: {}", device_id, e);
                        return;
                    }
                }
            }
            None => stream,
        };

        let text = match self.transcriber.transcribe(&stream).await {
            Ok(text) => text,
            Err(e) => {
                error!("Transcription failed for {}: {}", device_id, e);
                return;
            }
        };

        if text.is_empty() {
            debug!("Empty transcription from {}, nothing to answer", device_id);
            return;
        }
        info!("Transcribed from {}: {}", device_id, text);

        if let Err(e) = self
            .orchestrator
            .respond(&self.dispatcher, &device_id, &text)
            .await
        {
            error!("Could not deliver answer to {}: {}", device_id, e);
        }
    }

    pub async fn send_command(
        &self,
        device_id: &str,
        command: &DeviceCommand,
    ) -> Result<(), TransportError> {
        send_command(self.transport.as_ref(), device_id, command).await
    }

    /// Publish the retained `server/status` message
    pub async fn announce(&self, status: &str) -> Result<(), TransportError> {
        let message = ServerStatusMessage {
            status: status.to_string(),
            server_id: self.server_id.clone(),
            ts: now_millis(),
        };
        publish_json(self.transport.as_ref(), &OutboundTopic::ServerStatus, &message).await?;

        info!("Announced server {} as {}", self.server_id, status);
        Ok(())
    }

    /// Start the reassembly and device sweepers
    pub fn spawn_sweepers(&self, config: &Config) -> Vec<JoinHandle<()>> {
        vec![
            self.reassembler
                .spawn_sweeper(config.reassembly.sweep_interval()),
            self.devices
                .spawn_sweeper(config.devices.sweep_interval(), Arc::clone(&self.transport)),
        ]
    }
}
