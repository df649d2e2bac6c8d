use anyhow::Result;
use async_trait::async_trait;
use loqa_assist::agents::{call_with_retry, AgentError, AgentRole, CapabilityAgent};
use loqa_assist::config::CallPolicy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

fn assert_near(actual: Duration, expected: Duration) {
    let slack = Duration::from_millis(20);
    assert!(
        actual >= expected && actual <= expected + slack,
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}

/// Agent that never answers
#[derive(Default)]
struct HangingAgent {
    started: Mutex<Vec<Instant>>,
}

#[async_trait]
impl CapabilityAgent for HangingAgent {
    async fn complete(&self, _prompt: &str) -> Result<String, AgentError> {
        self.started.lock().push(Instant::now());
        std::future::pending::<Result<String, AgentError>>().await
    }
}

/// Agent returning queued results in order
struct QueuedAgent {
    results: Mutex<VecDeque<Result<String, AgentError>>>,
    calls: Mutex<usize>,
}

impl QueuedAgent {
    fn new(results: Vec<Result<String, AgentError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl CapabilityAgent for QueuedAgent {
    async fn complete(&self, _prompt: &str) -> Result<String, AgentError> {
        *self.calls.lock() += 1;
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Transport("exhausted".to_string())))
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_retries_once_with_backoff() -> Result<()> {
    let agent = HangingAgent::default();
    let policy = CallPolicy::new(2.0, 1);

    let start = Instant::now();
    let result = call_with_retry(&agent, AgentRole::Search, "giá vàng", policy, "req-1").await;

    assert!(matches!(
        result,
        Err(AgentError::Timeout {
            role: AgentRole::Search,
            ..
        })
    ));

    let started = agent.started.lock().clone();
    assert_eq!(started.len(), 2);
    // First attempt times out after 2s, then 0.5s of backoff
    assert_near(started[1] - started[0], Duration::from_millis(2500));
    assert_near(start.elapsed(), Duration::from_millis(4500));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_exponentially() -> Result<()> {
    let agent = QueuedAgent::new(vec![
        Err(AgentError::Transport("reset".to_string())),
        Err(AgentError::Transport("reset".to_string())),
        Err(AgentError::Transport("reset".to_string())),
    ]);
    let start = Instant::now();

    let result = call_with_retry(&agent, AgentRole::Task, "x", CallPolicy::new(5.0, 2), "req-2").await;

    assert!(matches!(result, Err(AgentError::Transport(_))));
    assert_eq!(agent.calls(), 3);
    assert_near(start.elapsed(), Duration::from_millis(500 + 1000));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_then_success() -> Result<()> {
    let agent = QueuedAgent::new(vec![
        Err(AgentError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }),
        Ok("Đã tìm thấy.".to_string()),
    ]);

    let text = call_with_retry(&agent, AgentRole::Search, "x", CallPolicy::new(20.0, 1), "req-3").await?;

    assert_eq!(text, "Đã tìm thấy.");
    assert_eq!(agent.calls(), 2);

    Ok(())
}

#[tokio::test]
async fn test_schema_errors_are_not_retried() -> Result<()> {
    let agent = QueuedAgent::new(vec![
        Err(AgentError::Schema("no choices".to_string())),
        Ok("unreachable".to_string()),
    ]);

    let result = call_with_retry(&agent, AgentRole::Planner, "x", CallPolicy::new(5.0, 3), "req-4").await;

    assert!(matches!(result, Err(AgentError::Schema(_))));
    assert_eq!(agent.calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_client_errors_are_not_retried() -> Result<()> {
    let agent = QueuedAgent::new(vec![Err(AgentError::Api {
        status: 401,
        message: "bad key".to_string(),
    })]);

    let result = call_with_retry(&agent, AgentRole::Critic, "x", CallPolicy::new(5.0, 2), "req-5").await;

    assert!(matches!(result, Err(AgentError::Api { status: 401, .. })));
    assert_eq!(agent.calls(), 1);

    Ok(())
}
