use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{AgentError, AgentRole, CapabilityAgent, TextStream};
use crate::config::CallPolicy;

/// Delay before the attempt following `attempt` (0-based): 0.5s, 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs_f64(0.5 * 2f64.powi(attempt.min(16) as i32))
}

/// Run `call` up to `policy.retries + 1` times, each bounded by
/// `policy.timeout()`. Non-retryable errors are returned immediately.
pub async fn with_retry<T, F, Fut>(
    role: AgentRole,
    policy: CallPolicy,
    request_id: &str,
    mut call: F,
) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let attempts = policy.retries + 1;
    let timeout = policy.timeout();
    let mut attempt = 0;

    loop {
        info!(
            req = %request_id,
            agent = %role,
            "Calling agent (attempt {}/{})",
            attempt + 1,
            attempts
        );

        let err = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => AgentError::Timeout {
                role,
                after: timeout,
            },
        };

        attempt += 1;
        if !err.is_retryable() || attempt >= attempts {
            error!(
                req = %request_id,
                agent = %role,
                "Agent call failed after {} attempt(s): {}",
                attempt,
                err
            );
            return Err(err);
        }

        let delay = backoff_delay(attempt - 1);
        warn!(
            req = %request_id,
            agent = %role,
            "Agent call failed: {}, retrying in {:?}",
            err,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Non-streaming completion with timeout and retry
pub async fn call_with_retry(
    agent: &dyn CapabilityAgent,
    role: AgentRole,
    prompt: &str,
    policy: CallPolicy,
    request_id: &str,
) -> Result<String, AgentError> {
    with_retry(role, policy, request_id, || agent.complete(prompt)).await
}

/// Open a streaming completion with timeout and retry. Only opening the
/// stream is retried; fragments already delivered cannot be taken back.
pub async fn stream_with_retry(
    agent: &dyn CapabilityAgent,
    role: AgentRole,
    prompt: &str,
    policy: CallPolicy,
    request_id: &str,
) -> Result<TextStream, AgentError> {
    with_retry(role, policy, request_id, || agent.complete_stream(prompt)).await
}
