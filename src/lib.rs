pub mod agents;
pub mod audio;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod http;
pub mod orchestrator;
pub mod reassembly;
pub mod server;
pub mod speech;
pub mod transport;

pub use agents::{AgentError, AgentRole, AgentSet, CapabilityAgent, OpenAiAgent};
pub use config::Config;
pub use devices::{DeviceSessionStore, DeviceSnapshot, DeviceStatus};
pub use dispatch::{AudioPublisher, SentenceDispatcher};
pub use http::{create_router, AppState};
pub use orchestrator::{Answer, AnswerStream, Orchestrator, RequestContext};
pub use reassembly::{CompletedStream, StreamReassembler};
pub use server::{AssistantServer, DeviceCommand};
pub use speech::{HttpSynthesizer, HttpTranscriber, SynthesizedAudio, Synthesizer, Transcriber};
pub use transport::{InboundMessage, MemoryTransport, NatsTransport, Transport};
