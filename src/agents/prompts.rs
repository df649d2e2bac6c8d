//! System prompts per role and the per-step prompt builders

use super::AgentRole;

pub fn system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Planner => PLANNER,
        AgentRole::Coordinator => COORDINATOR,
        AgentRole::Search => SEARCH,
        AgentRole::Task => TASK,
        AgentRole::Response => RESPONSE,
        AgentRole::Critic => CRITIC,
    }
}

const PLANNER: &str = "You plan the next step for a voice assistant. \
Reply with a single JSON object and nothing else: \
{\"step_type\": \"search\" | \"task\" | \"answer\" | \"clarify\", \
\"goal\": string, \"inputs\": object, \"success_criteria\": string}. \
Use \"answer\" when the user can be answered directly.";

const COORDINATOR: &str = "You route a user request to one agent. \
Reply with a single JSON object: {\"agent\": \"search\" | \"task\" | \"response\", \
\"request\": string}.";

const SEARCH: &str = "You look up facts for a voice assistant. \
Return concise findings with the key numbers, names and dates.";

const TASK: &str = "You carry out a concrete task for a voice assistant \
using the structured inputs you are given, and report the outcome briefly.";

const RESPONSE: &str = "You are a friendly voice assistant. Answer in the \
user's language with short spoken sentences. No markdown, lists or emoji.";

const CRITIC: &str = "You judge whether the work so far answers the user. \
Reply with a single JSON object: {\"decision\": \"continue\" | \"stop\", \
\"reason\": string}.";

pub fn planner(summary: &str) -> String {
    format!("{summary}\n\nDecide the next step. Reply with JSON only.")
}

pub fn search(summary: &str, goal: &str) -> String {
    format!("{summary}\n\nFind information for: {goal}")
}

pub fn clarify(summary: &str, goal: &str) -> String {
    format!("{summary}\n\nClarify what the user needs: {goal}")
}

pub fn task(summary: &str, goal: &str, inputs: &str) -> String {
    format!("{summary}\n\nTask: {goal}\nInputs: {inputs}")
}

pub fn answer(summary: &str, goal: &str) -> String {
    format!("{summary}\n\nAnswer the user: {goal}")
}

pub fn critic(summary: &str, success_criteria: &str) -> String {
    let criteria = if success_criteria.is_empty() {
        "the user's question is fully answered"
    } else {
        success_criteria
    };
    format!(
        "{summary}\n\nSuccess criteria: {criteria}\n\
         Should another step run? Reply with JSON: \
         {{\"decision\": \"continue\" | \"stop\", \"reason\": string}}"
    )
}

pub fn summary(context_summary: &str) -> String {
    format!("{context_summary}\n\nUsing the results above, give the user a final spoken answer.")
}

pub fn route(input: &str) -> String {
    format!("User request: {input}\n\nWhich agent should handle it? Reply with JSON only.")
}
