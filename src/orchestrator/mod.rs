//! Plan, execute and critique loop
//!
//! A request starts at PLAN. The planner picks a step; an `answer` step is
//! executed against the response agent and returned as is. Any other step is
//! executed by its agent and then reviewed by the critic, which decides
//! whether to plan again. When the loop stops (critic, deadline or step
//! limit) the response agent streams a final summary.
//!
//! The deadline is only checked before PLAN, so one slow agent call can run
//! past it. Individual calls are bounded by their own timeouts.

mod answer;
mod context;
mod plan;

pub use answer::{Answer, AnswerStream};
pub use context::{ExecutionRecord, RequestContext, RESULT_PREVIEW_CHARS};
pub use plan::{Critique, Decision, PlannedStep, Route, StepType};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agents::{call_with_retry, prompts, stream_with_retry, AgentError, AgentRole, AgentSet};
use crate::config::{OrchestratorConfig, Strategy};
use crate::dispatch::{DispatchError, SentenceDispatcher};

pub struct Orchestrator {
    agents: AgentSet,
    config: OrchestratorConfig,
    /// One turn per device at a time, so two answers never share a sentence buffer
    turns: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(agents: AgentSet, config: OrchestratorConfig) -> Self {
        Self {
            agents,
            config,
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn new_context(&self, device_id: &str, input: &str) -> RequestContext {
        RequestContext::new(device_id, input, self.config.deadline(), self.config.max_steps)
    }

    /// Answer `ctx.original_input` with the configured strategy
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<Answer, AgentError> {
        info!(
            req = %ctx.request_id,
            device = %ctx.device_id,
            "Orchestrating request: {}",
            ctx.original_input
        );

        match self.config.strategy {
            Strategy::PlanLoop => self.plan_loop(ctx).await,
            Strategy::SingleRoute => self.single_route(ctx).await,
        }
    }

    async fn plan_loop(&self, ctx: &mut RequestContext) -> Result<Answer, AgentError> {
        let mut step_index = 0;

        loop {
            if ctx.past_deadline() {
                warn!(req = %ctx.request_id, "Deadline reached after {} step(s)", step_index);
                break;
            }
            if step_index >= ctx.max_steps {
                info!(req = %ctx.request_id, "Step limit of {} reached", ctx.max_steps);
                break;
            }

            let step = match self
                .call(AgentRole::Planner, &prompts::planner(&ctx.summary()), ctx)
                .await
            {
                Ok(raw) => PlannedStep::parse(&raw, &ctx.original_input),
                Err(e) => {
                    warn!(req = %ctx.request_id, "Planner failed, answering directly: {}", e);
                    PlannedStep::answer(&ctx.original_input)
                }
            };
            info!(
                req = %ctx.request_id,
                "Step {}: {:?} - {}",
                step_index + 1,
                step.step_type,
                step.goal
            );

            let role = step.step_type.agent();
            let prompt = execution_prompt(&step, &ctx.summary());
            let result = self.call(role, &prompt, ctx).await?;

            let terminal = step.step_type == StepType::Answer;
            let criteria = step.success_criteria.clone();
            ctx.record(ExecutionRecord {
                step,
                agent_used: role,
                prompt,
                result: result.clone(),
            });

            if terminal {
                return Ok(Answer::Direct(result));
            }

            let critique = match self
                .call(AgentRole::Critic, &prompts::critic(&ctx.summary(), &criteria), ctx)
                .await
            {
                Ok(raw) => Critique::parse(&raw),
                Err(e) => {
                    warn!(req = %ctx.request_id, "Critic failed, stopping: {}", e);
                    Critique::stop(e.to_string())
                }
            };
            info!(
                req = %ctx.request_id,
                "Critic: {:?} ({})",
                critique.decision,
                critique.reason
            );

            match critique.decision {
                Decision::Continue => {
                    if !critique.reason.is_empty() {
                        ctx.note(format!("Critic after step {}: {}", step_index + 1, critique.reason));
                    }
                    step_index += 1;
                }
                Decision::Stop => break,
            }
        }

        self.summarize(ctx).await
    }

    async fn single_route(&self, ctx: &mut RequestContext) -> Result<Answer, AgentError> {
        let route = self.route(&ctx.original_input, &ctx.request_id).await?;
        info!(req = %ctx.request_id, "Routed to {}", route.agent);

        let step = match route.agent {
            AgentRole::Search => PlannedStep {
                step_type: StepType::Search,
                ..PlannedStep::answer(route.request)
            },
            AgentRole::Task => PlannedStep {
                step_type: StepType::Task,
                ..PlannedStep::answer(route.request)
            },
            _ => {
                let prompt = prompts::answer(&ctx.summary(), &route.request);
                let stream = stream_with_retry(
                    self.agents.response.as_ref(),
                    AgentRole::Response,
                    &prompt,
                    self.config.policy(AgentRole::Response),
                    &ctx.request_id,
                )
                .await?;
                return Ok(Answer::Streamed(AnswerStream::new(stream)));
            }
        };

        let role = step.step_type.agent();
        let prompt = execution_prompt(&step, &ctx.summary());
        let result = self.call(role, &prompt, ctx).await?;
        ctx.record(ExecutionRecord {
            step,
            agent_used: role,
            prompt,
            result,
        });

        self.summarize(ctx).await
    }

    /// Ask the coordinator which agent should handle `input`
    pub async fn route(&self, input: &str, request_id: &str) -> Result<Route, AgentError> {
        let raw = call_with_retry(
            self.agents.coordinator.as_ref(),
            AgentRole::Coordinator,
            &prompts::route(input),
            self.config.policy(AgentRole::Coordinator),
            request_id,
        )
        .await?;

        Ok(Route::parse(&raw, input))
    }

    async fn summarize(&self, ctx: &RequestContext) -> Result<Answer, AgentError> {
        info!(
            req = %ctx.request_id,
            "Summarizing {} step(s)",
            ctx.steps().len()
        );

        let stream = stream_with_retry(
            self.agents.response.as_ref(),
            AgentRole::Response,
            &prompts::summary(&ctx.summary()),
            self.config.policy(AgentRole::Response),
            &ctx.request_id,
        )
        .await?;

        Ok(Answer::Streamed(AnswerStream::new(stream)))
    }

    async fn call(
        &self,
        role: AgentRole,
        prompt: &str,
        ctx: &RequestContext,
    ) -> Result<String, AgentError> {
        call_with_retry(
            self.agents.get(role).as_ref(),
            role,
            prompt,
            self.config.policy(role),
            &ctx.request_id,
        )
        .await
    }

    /// Answer one utterance and speak the result on `device_id`
    ///
    /// Fragments are forwarded to the dispatcher as they arrive and the
    /// device stream is always closed with an end marker. Agent failures
    /// are replaced by the apology text. Requests for the same device are
    /// answered one after another. Returns the text handed to the
    /// dispatcher.
    pub async fn respond(
        &self,
        dispatcher: &SentenceDispatcher,
        device_id: &str,
        input: &str,
    ) -> Result<String, DispatchError> {
        let turn = self.turn(device_id);
        let _turn = turn.lock().await;

        let mut ctx = self.new_context(device_id, input);
        let mut spoken = String::new();

        match self.run(&mut ctx).await {
            Ok(answer) => {
                let mut stream = answer.into_stream();
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => {
                            spoken.push_str(&fragment);
                            if let Err(e) = dispatcher.push(device_id, fragment).await {
                                stream.cancel();
                                return Err(e);
                            }
                        }
                        Err(e) => {
                            error!(req = %ctx.request_id, "Answer stream failed: {}", e);
                            self.apologize(dispatcher, device_id, &mut spoken).await?;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!(req = %ctx.request_id, "Request failed: {}", e);
                self.apologize(dispatcher, device_id, &mut spoken).await?;
            }
        }

        dispatcher.end(device_id).await?;
        info!(
            req = %ctx.request_id,
            device = %device_id,
            "Request finished after {} step(s)",
            ctx.steps().len()
        );

        Ok(spoken)
    }

    fn turn(&self, device_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.turns.lock().entry(device_id.to_string()).or_default())
    }

    async fn apologize(
        &self,
        dispatcher: &SentenceDispatcher,
        device_id: &str,
        spoken: &mut String,
    ) -> Result<(), DispatchError> {
        // Close any half sentence so the apology is spoken on its own
        let text = if spoken.is_empty() {
            self.config.apology.clone()
        } else {
            format!("\n{}", self.config.apology)
        };
        spoken.push_str(&text);
        dispatcher.push(device_id, text).await
    }
}

fn execution_prompt(step: &PlannedStep, summary: &str) -> String {
    match step.step_type {
        StepType::Search => prompts::search(summary, &step.goal),
        StepType::Clarify => prompts::clarify(summary, &step.goal),
        StepType::Task => prompts::task(summary, &step.goal, &step.inputs.to_string()),
        StepType::Answer => prompts::answer(summary, &step.goal),
    }
}
