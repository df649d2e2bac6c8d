//! Device liveness tracking
//!
//! Pings and info messages refresh a device; a periodic sweep downgrades
//! silent devices to `timeout` and then `offline`, announcing the latter with
//! a retained status notice.

mod record;

pub use record::{DeviceRecord, DeviceSnapshot, DeviceStatus};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::DeviceConfig;
use crate::transport::messages::now_millis;
use crate::transport::{publish_json, DeviceStatusNotice, OutboundTopic, Transport};

#[derive(Default)]
struct Inner {
    devices: HashMap<String, DeviceRecord>,
    /// Online set at the last sweep, to log only on change
    last_reported: Vec<String>,
}

/// Single owner of every [`DeviceRecord`]
pub struct DeviceSessionStore {
    inner: Mutex<Inner>,
    timeout_after: Duration,
    offline_after: Duration,
}

impl DeviceSessionStore {
    pub fn new(config: &DeviceConfig) -> Self {
        Self::with_thresholds(config.timeout_after(), config.offline_after())
    }

    pub fn with_thresholds(timeout_after: Duration, offline_after: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            timeout_after,
            offline_after,
        }
    }

    /// Record a ping
    pub fn on_ping(&self, device_id: &str) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let record = inner
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                info!("New device connected: {}", device_id);
                DeviceRecord::new(device_id)
            });
        record.touch(now);
        record.last_ping = Some(now);

        if !record.greeted {
            record.greeted = true;
            let active = online_devices(&inner.devices);
            info!(
                "{} device(s) currently connected: {}",
                active.len(),
                active.join(", ")
            );
        }
    }

    /// Record telemetry
    pub fn on_info(&self, device_id: &str, battery: Option<f64>, gps: Option<serde_json::Value>) {
        match battery {
            Some(level) => info!("Device {} info: battery={:.1}%", device_id, level * 100.0),
            None => info!("Device {} info received", device_id),
        }

        let mut inner = self.inner.lock();
        let record = inner
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceRecord::new(device_id));

        record.battery = battery;
        record.gps = gps;
        record.touch(Instant::now());
    }

    /// Record a self-reported status change
    pub fn on_status(&self, device_id: &str, status: &str) {
        let status = DeviceStatus::from_reported(status);
        info!("Device {} is now {}", device_id, status);

        let mut inner = self.inner.lock();
        inner
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceRecord::new(device_id))
            .status = status;
    }

    /// Downgrade silent devices.
    ///
    /// Returns the devices that went offline during this sweep; each device
    /// is returned at most once per silence period.
    pub fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut went_offline = Vec::new();
        let mut inner = self.inner.lock();

        for (device_id, record) in inner.devices.iter_mut() {
            let Some(last_seen) = record.last_seen else {
                continue;
            };
            if record.status == DeviceStatus::Offline {
                continue;
            }

            let silent_for = now.saturating_duration_since(last_seen);

            if silent_for > self.offline_after {
                warn!("Device {} disconnected (silent for {:?})", device_id, silent_for);
                record.status = DeviceStatus::Offline;
                went_offline.push(device_id.clone());
            } else if silent_for > self.timeout_after && record.status != DeviceStatus::Timeout {
                warn!("Device {} not responding (silent for {:?})", device_id, silent_for);
                record.status = DeviceStatus::Timeout;
            }
        }

        let active = online_devices(&inner.devices);
        if !active.is_empty() && active != inner.last_reported {
            info!("{} device(s) active: {}", active.len(), active.join(", "));
        }
        inner.last_reported = active;

        went_offline
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.inner.lock().devices.get(device_id).map(|r| r.snapshot())
    }

    pub fn status(&self, device_id: &str) -> Option<DeviceStatus> {
        self.inner.lock().devices.get(device_id).map(|r| r.status)
    }

    /// All devices, sorted by id
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let mut devices: Vec<DeviceSnapshot> = self
            .inner
            .lock()
            .devices
            .values()
            .map(|r| r.snapshot())
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    /// Run [`sweep`](Self::sweep) every `interval`, announcing offline devices
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        transport: Arc<dyn Transport>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            info!("Device status sweeper started (every {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                for device_id in store.sweep() {
                    announce_offline(transport.as_ref(), &device_id).await;
                }
            }
        })
    }
}

/// Publish the retained offline notice for a silent device
pub async fn announce_offline(transport: &dyn Transport, device_id: &str) {
    let notice = DeviceStatusNotice {
        device_id: device_id.to_string(),
        status: DeviceStatus::Offline.to_string(),
        reason: "ping_timeout".to_string(),
        ts: now_millis(),
    };

    let topic = OutboundTopic::DeviceStatus(device_id.to_string());
    if let Err(e) = publish_json(transport, &topic, &notice).await {
        error!("Failed to announce {} offline: {}", device_id, e);
    }
}

fn online_devices(devices: &HashMap<String, DeviceRecord>) -> Vec<String> {
    let mut active: Vec<String> = devices
        .values()
        .filter(|r| r.status == DeviceStatus::Online)
        .map(|r| r.device_id.clone())
        .collect();
    active.sort();
    active
}
