//! Capability agents
//!
//! Each reasoning role (planner, coordinator, search, task, response, critic)
//! is a pluggable agent that turns a prompt into text. Calls return a typed
//! [`AgentError`] so callers can tell timeouts, backend failures and schema
//! violations apart.

pub mod json;
mod openai;
pub mod prompts;
mod retry;

pub use openai::OpenAiAgent;
pub use retry::{backoff_delay, call_with_retry, stream_with_retry, with_retry};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

/// Reasoning roles used by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planner,
    Coordinator,
    Search,
    Task,
    Response,
    Critic,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Planner,
        AgentRole::Coordinator,
        AgentRole::Search,
        AgentRole::Task,
        AgentRole::Response,
        AgentRole::Critic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Coordinator => "coordinator",
            AgentRole::Search => "search",
            AgentRole::Task => "task",
            AgentRole::Response => "response",
            AgentRole::Critic => "critic",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("{role} agent timed out after {after:?}")]
    Timeout { role: AgentRole, after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    Schema(String),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

impl AgentError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Timeout { .. } | AgentError::Transport(_) | AgentError::Stream(_) => true,
            AgentError::Api { status, .. } => *status == 429 || *status >= 500,
            AgentError::Schema(_) => false,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AgentError::Schema(e.to_string())
        } else {
            AgentError::Transport(e.to_string())
        }
    }
}

/// Ordered text fragments produced by a streaming completion
pub type TextStream = BoxStream<'static, Result<String, AgentError>>;

#[async_trait]
pub trait CapabilityAgent: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;

    /// Stream the completion. Agents without native streaming yield the
    /// whole answer as a single fragment.
    async fn complete_stream(&self, prompt: &str) -> Result<TextStream, AgentError> {
        let text = self.complete(prompt).await?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }
}

/// One agent per role
#[derive(Clone)]
pub struct AgentSet {
    pub planner: Arc<dyn CapabilityAgent>,
    pub coordinator: Arc<dyn CapabilityAgent>,
    pub search: Arc<dyn CapabilityAgent>,
    pub task: Arc<dyn CapabilityAgent>,
    pub response: Arc<dyn CapabilityAgent>,
    pub critic: Arc<dyn CapabilityAgent>,
}

impl AgentSet {
    /// Use the same agent for every role
    pub fn uniform(agent: Arc<dyn CapabilityAgent>) -> Self {
        Self {
            planner: Arc::clone(&agent),
            coordinator: Arc::clone(&agent),
            search: Arc::clone(&agent),
            task: Arc::clone(&agent),
            response: Arc::clone(&agent),
            critic: agent,
        }
    }

    /// Build OpenAI-compatible agents, each with its role prompt
    pub fn openai(config: &LlmConfig) -> Result<Self, AgentError> {
        let agent = |role: AgentRole| -> Result<Arc<dyn CapabilityAgent>, AgentError> {
            Ok(Arc::new(OpenAiAgent::new(config, role)?))
        };

        Ok(Self {
            planner: agent(AgentRole::Planner)?,
            coordinator: agent(AgentRole::Coordinator)?,
            search: agent(AgentRole::Search)?,
            task: agent(AgentRole::Task)?,
            response: agent(AgentRole::Response)?,
            critic: agent(AgentRole::Critic)?,
        })
    }

    pub fn get(&self, role: AgentRole) -> &Arc<dyn CapabilityAgent> {
        match role {
            AgentRole::Planner => &self.planner,
            AgentRole::Coordinator => &self.coordinator,
            AgentRole::Search => &self.search,
            AgentRole::Task => &self.task,
            AgentRole::Response => &self.response,
            AgentRole::Critic => &self.critic,
        }
    }

    /// Replace the agent for one role
    pub fn with(mut self, role: AgentRole, agent: Arc<dyn CapabilityAgent>) -> Self {
        match role {
            AgentRole::Planner => self.planner = agent,
            AgentRole::Coordinator => self.coordinator = agent,
            AgentRole::Search => self.search = agent,
            AgentRole::Task => self.task = agent,
            AgentRole::Response => self.response = agent,
            AgentRole::Critic => self.critic = agent,
        }
        self
    }
}
