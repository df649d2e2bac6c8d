use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::system_prompt;
use super::{AgentError, AgentRole, CapabilityAgent, TextStream};
use crate::config::LlmConfig;

/// Agent backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiAgent {
    client: Client,
    role: AgentRole,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// One line of a server-sent event stream
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .map(SseLine::Delta)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            debug!("Ignoring unparseable stream event: {}", e);
            SseLine::Skip
        }
    }
}

impl OpenAiAgent {
    pub fn new(config: &LlmConfig, role: AgentRole) -> Result<Self, AgentError> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;

        Ok(Self {
            client,
            role,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn post(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, AgentError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt(self.role),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            stream,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CapabilityAgent for OpenAiAgent {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        let response: ChatResponse = self.post(prompt, false).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Schema("completion has no message content".to_string()))
    }

    async fn complete_stream(&self, prompt: &str) -> Result<TextStream, AgentError> {
        let mut bytes = Box::pin(self.post(prompt, true).await?.bytes_stream());

        let stream = async_stream::stream! {
            // Lines are split on raw bytes so multi-byte characters that
            // straddle network chunks stay intact
            let mut pending: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AgentError::Stream(e.to_string()));
                        return;
                    }
                };
                pending.extend_from_slice(&chunk);

                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    match parse_sse_line(String::from_utf8_lossy(&line).trim()) {
                        SseLine::Delta(text) => yield Ok(text),
                        SseLine::Done => return,
                        SseLine::Skip => {}
                    }
                }
            }

            if let SseLine::Delta(text) = parse_sse_line(String::from_utf8_lossy(&pending).trim()) {
                yield Ok(text);
            }
        };

        Ok(Box::pin(stream))
    }
}
