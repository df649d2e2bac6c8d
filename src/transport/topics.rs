use std::fmt;

use serde::de::DeserializeOwned;

use super::messages::{
    AudioChunkMessage, DeviceLogMessage, InfoMessage, PingMessage, StatusMessage,
};
use super::DecodeError;

/// Every kind of device-originated message the server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    /// `device/{id}/stt/audio` and `device/{id}/mic`
    Audio,
    /// `device/{id}/ping`
    Ping,
    /// `device/{id}/info`
    Info,
    /// `device/{id}/status`
    Status,
    /// `device/{id}/log`
    Log,
}

impl InboundKind {
    /// Resolve a device topic into `(device_id, kind)`.
    ///
    /// Unknown shapes are an error rather than a silent no-op.
    pub fn parse(topic: &str) -> Result<(String, Self), DecodeError> {
        let parts: Vec<&str> = topic.split('/').collect();
        let unknown = || DecodeError::UnknownTopic(topic.to_string());

        match parts.as_slice() {
            ["device", id, rest @ ..] if !id.is_empty() => {
                let kind = match rest {
                    ["stt", "audio"] | ["mic"] => Self::Audio,
                    ["ping"] => Self::Ping,
                    ["info"] => Self::Info,
                    ["status"] => Self::Status,
                    ["log"] => Self::Log,
                    _ => return Err(unknown()),
                };
                Ok((id.to_string(), kind))
            }
            _ => Err(unknown()),
        }
    }
}

/// Decoded payload, one variant per [`InboundKind`]
#[derive(Debug, Clone)]
pub enum InboundPayload {
    Audio(AudioChunkMessage),
    Ping(PingMessage),
    Info(InfoMessage),
    Status(StatusMessage),
    Log(DeviceLogMessage),
}

/// A fully decoded message from a device
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub device_id: String,
    pub payload: InboundPayload,
}

impl InboundMessage {
    /// Decode a raw transport message
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, DecodeError> {
        let (device_id, kind) = InboundKind::parse(topic)?;

        let payload = match kind {
            InboundKind::Audio => InboundPayload::Audio(parse_json(topic, payload)?),
            InboundKind::Ping => InboundPayload::Ping(parse_json(topic, payload)?),
            InboundKind::Info => InboundPayload::Info(parse_json(topic, payload)?),
            InboundKind::Status => InboundPayload::Status(parse_json(topic, payload)?),
            InboundKind::Log => InboundPayload::Log(parse_json(topic, payload)?),
        };

        Ok(Self { device_id, payload })
    }

    pub fn kind(&self) -> InboundKind {
        match self.payload {
            InboundPayload::Audio(_) => InboundKind::Audio,
            InboundPayload::Ping(_) => InboundKind::Ping,
            InboundPayload::Info(_) => InboundKind::Info,
            InboundPayload::Status(_) => InboundKind::Status,
            InboundPayload::Log(_) => InboundKind::Log,
        }
    }
}

fn parse_json<T: DeserializeOwned>(topic: &str, payload: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|source| DecodeError::MalformedPayload {
        topic: topic.to_string(),
        source,
    })
}

/// Topics the server publishes to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutboundTopic {
    /// `server/{id}/audio`
    Audio(String),
    /// `server/{id}/pong`
    Pong(String),
    /// `server/{id}/command`
    Command(String),
    /// `device/{id}/status`, retained
    DeviceStatus(String),
    /// `server/status`, retained
    ServerStatus,
}

impl OutboundTopic {
    /// Whether the broker should keep the last message for late subscribers
    pub fn retained(&self) -> bool {
        matches!(self, Self::DeviceStatus(_) | Self::ServerStatus)
    }
}

impl fmt::Display for OutboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio(id) => write!(f, "server/{}/audio", id),
            Self::Pong(id) => write!(f, "server/{}/pong", id),
            Self::Command(id) => write!(f, "server/{}/command", id),
            Self::DeviceStatus(id) => write!(f, "device/{}/status", id),
            Self::ServerStatus => write!(f, "server/status"),
        }
    }
}
