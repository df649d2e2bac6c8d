use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Liveness of a device as seen by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    /// Silent for longer than the timeout threshold
    Timeout,
    Offline,
}

impl DeviceStatus {
    /// Map a self-reported status string; unknown values count as online
    pub fn from_reported(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "offline" => Self::Offline,
            "timeout" => Self::Timeout,
            _ => Self::Online,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Online => "online",
            Self::Timeout => "timeout",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for one device
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub status: DeviceStatus,
    /// Monotonic time of the last ping or info message
    pub last_seen: Option<Instant>,
    pub last_ping: Option<Instant>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub battery: Option<f64>,
    pub gps: Option<serde_json::Value>,
    pub(crate) greeted: bool,
}

impl DeviceRecord {
    pub(crate) fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: DeviceStatus::Online,
            last_seen: None,
            last_ping: None,
            last_seen_at: None,
            battery: None,
            gps: None,
            greeted: false,
        }
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_seen = Some(now);
        self.last_seen_at = Some(Utc::now());
        self.status = DeviceStatus::Online;
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id.clone(),
            status: self.status,
            last_seen: self.last_seen_at,
            battery: self.battery,
            gps: self.gps.clone(),
        }
    }
}

/// Serializable view of a [`DeviceRecord`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub battery: Option<f64>,
    pub gps: Option<serde_json::Value>,
}
