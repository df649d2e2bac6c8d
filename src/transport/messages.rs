use serde::{Deserialize, Deserializer, Serialize};

/// Audio chunk published by a device on `device/{id}/stt/audio` or `device/{id}/mic`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunkMessage {
    /// Devices send either a string or a numeric stream id
    #[serde(deserialize_with = "string_or_number")]
    pub stream_id: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default = "default_total_chunks")]
    pub total_chunks: u32,
    #[serde(default)]
    pub is_last: bool,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Base64-encoded audio bytes
    #[serde(default)]
    pub data: String,
}

/// Keep-alive ping from a device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingMessage {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Periodic device telemetry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoMessage {
    /// Battery level as a fraction (0.0 to 1.0)
    #[serde(default)]
    pub battery: Option<f64>,
    /// GPS fix in whatever shape the firmware reports
    #[serde(default)]
    pub gps: Option<serde_json::Value>,
}

/// Self-reported device status ("online", "offline", ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
}

/// Log line forwarded by a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceLogMessage {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Audio chunk sent from the server to a device on `server/{id}/audio`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerAudioChunk {
    pub stream_id: String,
    pub server_stream_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub is_last: bool,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    pub format: String,
    pub sample_rate: u32,
    pub data: String,
}

/// Reply to a device ping on `server/{id}/pong`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    pub data: String,
    pub ts: i64,
}

/// Retained server presence on `server/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatusMessage {
    pub status: String,
    pub server_id: String,
    pub ts: i64,
}

/// Retained notice published when the server gives up on a silent device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusNotice {
    pub device_id: String,
    pub status: String,
    pub reason: String,
    pub ts: i64,
}

/// Current wall-clock time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn default_total_chunks() -> u32 {
    1
}

fn default_format() -> String {
    "pcm16le".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
