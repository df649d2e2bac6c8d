//! Parsing of planner, critic and coordinator output
//!
//! None of these ever fail: malformed output maps to a safe default
//! (answer, stop and response respectively).

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::agents::json::parse_json_object;
use crate::agents::AgentRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Search,
    Task,
    Answer,
    Clarify,
}

impl StepType {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Some(StepType::Search),
            "task" => Some(StepType::Task),
            "answer" => Some(StepType::Answer),
            "clarify" => Some(StepType::Clarify),
            _ => None,
        }
    }

    /// Agent that executes this kind of step
    pub fn agent(&self) -> AgentRole {
        match self {
            StepType::Search | StepType::Clarify => AgentRole::Search,
            StepType::Task => AgentRole::Task,
            StepType::Answer => AgentRole::Response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub step_type: StepType,
    pub goal: String,
    pub inputs: Value,
    pub success_criteria: String,
}

impl PlannedStep {
    pub fn answer(goal: impl Into<String>) -> Self {
        Self {
            step_type: StepType::Answer,
            goal: goal.into(),
            inputs: Value::Object(Map::new()),
            success_criteria: String::new(),
        }
    }

    /// Interpret planner output, falling back to answering `original_input`
    pub fn parse(raw: &str, original_input: &str) -> Self {
        let Some(map) = parse_json_object(raw) else {
            warn!("Planner output is not JSON, answering directly");
            return Self::answer(original_input);
        };

        let Some(step_type) = field(&map, "step_type", "stepType").and_then(StepType::parse) else {
            warn!("Planner returned no valid step type, answering directly");
            return Self::answer(original_input);
        };

        let goal = map
            .get("goal")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or(original_input)
            .to_string();

        let inputs = match map.get("inputs") {
            Some(v @ Value::Object(_)) => v.clone(),
            _ => Value::Object(Map::new()),
        };

        Self {
            step_type,
            goal,
            inputs,
            success_criteria: field(&map, "success_criteria", "successCriteria")
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn field<'a>(map: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a str> {
    map.get(snake)
        .or_else(|| map.get(camel))
        .and_then(Value::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Critique {
    pub decision: Decision,
    pub reason: String,
}

impl Critique {
    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Stop,
            reason: reason.into(),
        }
    }

    /// Only an explicit "continue" keeps the loop going
    pub fn parse(raw: &str) -> Self {
        let Some(map) = parse_json_object(raw) else {
            return Self::stop("critic output unreadable");
        };

        let decision = match map.get("decision").and_then(Value::as_str) {
            Some(d) if d.trim().eq_ignore_ascii_case("continue") => Decision::Continue,
            _ => Decision::Stop,
        };

        Self {
            decision,
            reason: map
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Coordinator choice for the single-route strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub agent: AgentRole,
    pub request: String,
}

impl Route {
    pub fn parse(raw: &str, original_input: &str) -> Self {
        let from_json = parse_json_object(raw).and_then(|map| {
            let agent = routable(map.get("agent")?.as_str()?)?;
            let request = map
                .get("request")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            Some((agent, request))
        });

        let (agent, request) = from_json.unwrap_or_else(|| {
            let lowered = raw.to_lowercase();
            let agent = if lowered.contains("search") {
                AgentRole::Search
            } else if lowered.contains("task") {
                AgentRole::Task
            } else {
                AgentRole::Response
            };
            (agent, String::new())
        });

        Self {
            agent,
            request: if request.is_empty() {
                original_input.to_string()
            } else {
                request
            },
        }
    }
}

fn routable(name: &str) -> Option<AgentRole> {
    match name.trim().to_ascii_lowercase().as_str() {
        "search" => Some(AgentRole::Search),
        "task" => Some(AgentRole::Task),
        "response" => Some(AgentRole::Response),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_fallback_on_garbage() {
        let step = PlannedStep::parse("not json", "Mấy giờ rồi?");
        assert_eq!(step.step_type, StepType::Answer);
        assert_eq!(step.goal, "Mấy giờ rồi?");
    }

    #[test]
    fn test_planner_invalid_step_type() {
        let step = PlannedStep::parse(r#"{"step_type": "dance", "goal": "x"}"#, "hi");
        assert_eq!(step, PlannedStep::answer("hi"));
    }

    #[test]
    fn test_planner_fenced_camel_case() {
        let raw = "```json\n{\"stepType\": \"task\", \"goal\": \"send sms\", \
                   \"inputs\": {\"to\": \"0901\"}, \"successCriteria\": \"sent\"}\n```";
        let step = PlannedStep::parse(raw, "hi");
        assert_eq!(step.step_type, StepType::Task);
        assert_eq!(step.goal, "send sms");
        assert_eq!(step.inputs["to"], "0901");
        assert_eq!(step.success_criteria, "sent");
    }

    #[test]
    fn test_planner_missing_goal_uses_input() {
        let step = PlannedStep::parse(r#"{"step_type": "search"}"#, "thời tiết");
        assert_eq!(step.step_type, StepType::Search);
        assert_eq!(step.goal, "thời tiết");
        assert!(step.inputs.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_critic_defaults_to_stop() {
        assert_eq!(Critique::parse("yes, continue please").decision, Decision::Stop);
        assert_eq!(Critique::parse(r#"{"reason": "?"}"#).decision, Decision::Stop);

        let c = Critique::parse(r#"{"decision": "Continue", "reason": "need price"}"#);
        assert_eq!(c.decision, Decision::Continue);
        assert_eq!(c.reason, "need price");
    }

    #[test]
    fn test_route_json_then_keywords() {
        let r = Route::parse(r#"{"agent": "task", "request": "bật đèn"}"#, "input");
        assert_eq!(r.agent, AgentRole::Task);
        assert_eq!(r.request, "bật đèn");

        let r = Route::parse("I would search for that", "giá vàng");
        assert_eq!(r.agent, AgentRole::Search);
        assert_eq!(r.request, "giá vàng");

        let r = Route::parse(r#"{"agent": "planner"}"#, "hello");
        assert_eq!(r.agent, AgentRole::Response);
        assert_eq!(r.request, "hello");
    }
}
