use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::time::Duration;
use tokio::time::Instant;

use super::plan::PlannedStep;
use crate::agents::AgentRole;

/// Longest step result carried into later prompts, in characters
pub const RESULT_PREVIEW_CHARS: usize = 400;

/// One executed step, immutable once recorded
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub step: PlannedStep,
    pub agent_used: AgentRole,
    pub prompt: String,
    pub result: String,
}

/// State of one transcribed utterance while it is being answered
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub device_id: String,
    pub original_input: String,
    pub created_at: DateTime<Utc>,
    pub deadline: Instant,
    pub max_steps: usize,
    steps: Vec<ExecutionRecord>,
    notes: Vec<String>,
}

impl RequestContext {
    pub fn new(
        device_id: impl Into<String>,
        original_input: impl Into<String>,
        budget: Duration,
        max_steps: usize,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            original_input: original_input.into(),
            created_at: Utc::now(),
            deadline: Instant::now() + budget,
            max_steps,
            steps: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn record(&mut self, record: ExecutionRecord) {
        self.steps.push(record);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn steps(&self) -> &[ExecutionRecord] {
        &self.steps
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Text rendering of the request fed to every agent prompt
    pub fn summary(&self) -> String {
        let mut out = format!("User request: {}", self.original_input);

        if !self.notes.is_empty() {
            out.push_str("\nNotes:");
            for note in &self.notes {
                let _ = write!(out, "\n- {}", note);
            }
        }

        if !self.steps.is_empty() {
            out.push_str("\nPrevious steps:");
            for (i, record) in self.steps.iter().enumerate() {
                let _ = write!(
                    out,
                    "\n{}. [{}] {} -> {}",
                    i + 1,
                    record.agent_used,
                    record.step.goal,
                    truncate(&record.result, RESULT_PREVIEW_CHARS)
                );
            }
        }

        out
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::plan::StepType;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("đẹp trời", 3), "đẹp…");
        assert_eq!(truncate("ngắn", 10), "ngắn");
    }

    #[tokio::test]
    async fn test_summary_lists_steps() {
        let mut ctx = RequestContext::new("dev-1", "Giá vàng hôm nay?", Duration::from_secs(25), 4);
        ctx.note("user prefers short answers");
        ctx.record(ExecutionRecord {
            step: PlannedStep {
                step_type: StepType::Search,
                goal: "gold price".to_string(),
                inputs: serde_json::json!({}),
                success_criteria: String::new(),
            },
            agent_used: AgentRole::Search,
            prompt: "p".to_string(),
            result: "x".repeat(500),
        });

        let summary = ctx.summary();
        assert!(summary.starts_with("User request: Giá vàng hôm nay?"));
        assert!(summary.contains("- user prefers short answers"));
        assert!(summary.contains("1. [search] gold price -> "));
        assert!(summary.ends_with(&format!("{}…", "x".repeat(400))));
        assert_eq!(ctx.steps().len(), 1);
        assert!(!ctx.past_deadline());
    }
}
