use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::audio::wav::sanitize;
use crate::transport::DeviceLogMessage;

/// Appends device-reported log lines to `<dir>/<device>.log`
#[derive(Debug, Clone)]
pub struct DeviceLogWriter {
    dir: PathBuf,
}

impl DeviceLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, device_id: &str) -> PathBuf {
        self.dir.join(format!("{}.log", sanitize(device_id)))
    }

    pub async fn append(&self, device_id: &str, entry: &DeviceLogMessage) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create log directory: {:?}", self.dir))?;

        let path = self.path_for(device_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open device log: {:?}", path))?;

        file.write_all(format_line(entry).as_bytes())
            .await
            .with_context(|| format!("Failed to write device log: {:?}", path))?;
        // tokio files complete writes in the background until flushed
        file.flush()
            .await
            .with_context(|| format!("Failed to flush device log: {:?}", path))?;

        Ok(path)
    }

}

fn format_line(entry: &DeviceLogMessage) -> String {
    let timestamp = entry
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let level = entry.level.as_deref().unwrap_or("info").to_uppercase();

    format!("[{}] [{}] {}\n", timestamp, level, entry.message)
}
