use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::agents::AgentRole;

/// Top-level service configuration.
///
/// Loaded from `config/loqa-assist.toml` (optional) and then overridden by
/// `LOQA_`-prefixed environment variables, e.g. `LOQA_NATS__URL`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub http: HttpConfig,
    pub reassembly: ReassemblyConfig,
    pub devices: DeviceConfig,
    pub dispatch: DispatchConfig,
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Directory for per-device log files forwarded over `device/{id}/log`
    pub device_logs_dir: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-assist".to_string(),
            device_logs_dir: "device_logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    /// Connection name shown by the broker
    pub name: String,
    /// `None` retries forever
    pub max_reconnects: Option<usize>,
    /// Upper bound for the delay between reconnect attempts
    pub reconnect_delay_ms: u64,
    /// Capacity of the queue between the subscription pump and the server loop
    pub inbound_capacity: usize,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            name: "loqa-assist".to_string(),
            max_reconnects: Some(60),
            reconnect_delay_ms: 5000,
            inbound_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Uploads idle for longer than this are dropped
    pub session_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Completed uploads are written here when set
    pub recordings_dir: Option<String>,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 60,
            sweep_interval_secs: 30,
            recordings_dir: None,
        }
    }
}

impl ReassemblyConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub timeout_after_secs: u64,
    pub offline_after_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timeout_after_secs: 15,
            offline_after_secs: 60,
            sweep_interval_secs: 5,
        }
    }
}

impl DeviceConfig {
    pub fn timeout_after(&self) -> Duration {
        Duration::from_secs(self.timeout_after_secs)
    }

    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.offline_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Size of each outbound audio chunk in bytes
    pub chunk_size: usize,
    /// Upper bound for the pause between outbound chunks
    pub max_chunk_delay_ms: u64,
    /// Capacity of the text fragment queue feeding the dispatcher
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024,
            max_chunk_delay_ms: 50,
            queue_capacity: 128,
        }
    }
}

/// Timeout and retry budget for one capability role
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CallPolicy {
    pub timeout_secs: f64,
    pub retries: u32,
}

impl CallPolicy {
    pub const fn new(timeout_secs: f64, retries: u32) -> Self {
        Self {
            timeout_secs,
            retries,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Plan, execute, critique until done
    #[default]
    PlanLoop,
    /// Let the coordinator pick a single agent
    SingleRoute,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub strategy: Strategy,
    pub max_steps: usize,
    pub deadline_secs: f64,
    pub planner: CallPolicy,
    pub coordinator: CallPolicy,
    pub search: CallPolicy,
    pub task: CallPolicy,
    pub response: CallPolicy,
    pub critic: CallPolicy,
    /// Spoken when a request fails
    pub apology: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::PlanLoop,
            max_steps: 4,
            deadline_secs: 25.0,
            planner: CallPolicy::new(12.0, 0),
            coordinator: CallPolicy::new(12.0, 0),
            search: CallPolicy::new(20.0, 1),
            task: CallPolicy::new(25.0, 1),
            response: CallPolicy::new(15.0, 0),
            critic: CallPolicy::new(10.0, 0),
            apology: "Xin lỗi, đã xảy ra lỗi khi xử lý yêu cầu của bạn.".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs_f64(self.deadline_secs)
    }

    pub fn policy(&self, role: AgentRole) -> CallPolicy {
        match role {
            AgentRole::Planner => self.planner,
            AgentRole::Coordinator => self.coordinator,
            AgentRole::Search => self.search,
            AgentRole::Task => self.task,
            AgentRole::Response => self.response,
            AgentRole::Critic => self.critic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Some gateways reject unknown user agents
    pub user_agent: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            user_agent: "curl/8.4.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub stt_base_url: String,
    pub stt_model: String,
    pub language: Option<String>,
    pub tts_base_url: String,
    pub tts_api_key: Option<String>,
    pub tts_model: String,
    pub voice: String,
    pub speed: f32,
    /// Used when the synthesized audio carries no readable sample rate
    pub default_sample_rate: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_base_url: "http://localhost:8299/v1".to_string(),
            stt_model: "whisper-1".to_string(),
            language: Some("vi".to_string()),
            tts_base_url: "http://localhost:8298/v1".to_string(),
            tts_api_key: None,
            tts_model: "tts-1".to_string(),
            voice: "nu-nhe-nhang".to_string(),
            speed: 1.0,
            default_sample_rate: 22050,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOQA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_timings() {
        let config = Config::default();

        assert_eq!(config.reassembly.session_timeout(), Duration::from_secs(60));
        assert_eq!(config.reassembly.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.devices.timeout_after(), Duration::from_secs(15));
        assert_eq!(config.devices.offline_after(), Duration::from_secs(60));
        assert_eq!(config.devices.sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.dispatch.chunk_size, 8192);
    }

    #[test]
    fn test_default_call_policies() {
        let config = OrchestratorConfig::default();

        assert_eq!(config.policy(AgentRole::Planner), CallPolicy::new(12.0, 0));
        assert_eq!(config.policy(AgentRole::Search), CallPolicy::new(20.0, 1));
        assert_eq!(config.policy(AgentRole::Task), CallPolicy::new(25.0, 1));
        assert_eq!(config.policy(AgentRole::Response), CallPolicy::new(15.0, 0));
        assert_eq!(config.policy(AgentRole::Critic), CallPolicy::new(10.0, 0));
        assert_eq!(config.max_steps, 4);
        assert_eq!(config.strategy, Strategy::PlanLoop);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("config/does-not-exist").unwrap();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.orchestrator.max_steps, 4);
    }
}
