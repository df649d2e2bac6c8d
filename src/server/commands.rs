use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::transport::messages::now_millis;
use crate::transport::{publish_json, OutboundTopic, Transport, TransportError};

/// Commands the server can push to a device on `server/{id}/command`
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SendSms { phone_number: String, message: String },
    Capture { mode: String, quality: String },
    Other(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("command name is empty")]
    EmptyCommand,

    #[error("send_sms requires a phone_number")]
    MissingPhoneNumber,
}

/// JSON body accepted by the HTTP command endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommandPayload<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
    ts: i64,
}

impl DeviceCommand {
    /// Photo capture at high quality
    pub fn capture() -> Self {
        DeviceCommand::Capture {
            mode: "photo".to_string(),
            quality: "high".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DeviceCommand::SendSms { .. } => "send_sms",
            DeviceCommand::Capture { .. } => "capture",
            DeviceCommand::Other(name) => name,
        }
    }

    pub fn from_request(request: CommandRequest) -> Result<Self, CommandError> {
        match request.command.trim() {
            "" => Err(CommandError::EmptyCommand),
            "send_sms" => {
                let phone_number = request
                    .phone_number
                    .filter(|p| !p.trim().is_empty())
                    .ok_or(CommandError::MissingPhoneNumber)?;
                Ok(DeviceCommand::SendSms {
                    phone_number,
                    message: request.message.unwrap_or_default(),
                })
            }
            "capture" => Ok(DeviceCommand::Capture {
                mode: request.mode.unwrap_or_else(|| "photo".to_string()),
                quality: request.quality.unwrap_or_else(|| "high".to_string()),
            }),
            other => Ok(DeviceCommand::Other(other.to_string())),
        }
    }

    fn payload(&self, ts: i64) -> CommandPayload<'_> {
        let mut payload = CommandPayload {
            command: self.name(),
            phone_number: None,
            message: None,
            mode: None,
            quality: None,
            ts,
        };

        match self {
            DeviceCommand::SendSms {
                phone_number,
                message,
            } => {
                payload.phone_number = Some(phone_number);
                payload.message = Some(message);
            }
            DeviceCommand::Capture { mode, quality } => {
                payload.mode = Some(mode);
                payload.quality = Some(quality);
            }
            DeviceCommand::Other(_) => {}
        }

        payload
    }
}

pub async fn send_command(
    transport: &dyn Transport,
    device_id: &str,
    command: &DeviceCommand,
) -> Result<(), TransportError> {
    let topic = OutboundTopic::Command(device_id.to_string());
    publish_json(transport, &topic, &command.payload(now_millis())).await?;

    info!("Sent command '{}' to {}", command.name(), device_id);
    Ok(())
}
