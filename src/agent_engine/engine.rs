use std::time::Duration;

use crate::agent_engine::history::{HistoryItem, HistoryPolicy, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::prompt::{self, StepPrompt};
use crate::agent_engine::state::{ActionResult, AgentOutput, AgentRunOutcome};
use crate::config::AgentConfig;
use crate::controller::registry::{ActionRegistry, AGENT_OUTPUT_TOOL};
use crate::controller::service::Controller;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::llm::provider::RoleClient;
use crate::llm::types::ToolCall;
use crate::perception::context::AppContext;

pub const STEP_TIMED_OUT: &str = "step timed out";

#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub step_timeout: Duration,
    pub history: HistoryPolicy,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_iterations: cfg.max_iterations,
            step_timeout: Duration::from_secs(cfg.step_timeout_secs),
            history: cfg.history,
        }
    }
}

/// The two model roles an application agent talks to.
#[derive(Clone)]
pub struct AgentModels {
    /// Per-step structured action inference.
    pub tools: RoleClient,
    /// Final-answer synthesis.
    pub chat: RoleClient,
}

/// What one step produced.
struct StepReport {
    item: HistoryItem,
    done: Option<ActionResult>,
}

impl StepReport {
    fn note(tool_call: Option<ToolCall>, observation: impl Into<String>) -> Self {
        Self {
            item: HistoryItem {
                tool_call,
                observations: vec![observation.into()],
            },
            done: None,
        }
    }
}

/// Bounded perceive → infer → act loop over one application.
pub struct ReactAgent {
    context: AppContext,
    controller: Controller,
    registry: ActionRegistry,
    models: AgentModels,
    settings: AgentSettings,
    history: SessionHistory,
}

impl ReactAgent {
    pub fn new(
        context: AppContext,
        controller: Controller,
        registry: ActionRegistry,
        models: AgentModels,
        settings: AgentSettings,
        history: SessionHistory,
    ) -> Self {
        Self {
            context,
            controller,
            registry,
            models,
            settings,
            history,
        }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Run until an action reports done or the iteration budget is spent,
    /// then ask the chat model for the final answer. Only an application
    /// launch failure or an unreachable model ends the run with `Err`.
    pub async fn run(&mut self, task: &str) -> MacAgentResult<AgentRunOutcome> {
        let agent = self.context.profile().agent_name;
        tracing::info!(agent, task, session = %self.history.session_id, "agent run started");

        let mut loop_ctl = LoopController::new(self.settings.max_iterations, self.settings.step_timeout);
        let mut finished: Option<ActionResult> = None;

        while let Some(step) = loop_ctl.next_step() {
            let report = match loop_ctl.run_step(self.step(task, step)).await {
                Some(report) => report?,
                None => StepReport::note(None, STEP_TIMED_OUT),
            };
            tracing::debug!(agent, step, observations = ?report.item.observations, "step recorded");
            self.history.push(step as usize, report.item);
            if let Some(done) = report.done {
                tracing::info!(agent, step, success = done.success, "agent reported done");
                finished = Some(done);
                break;
            }
        }

        let steps = loop_ctl.step() as usize;
        let answer = self.final_answer(task, finished.as_ref()).await;
        tracing::info!(agent, steps, "agent run finished");
        Ok(AgentRunOutcome {
            answer,
            steps,
            success: finished.is_some_and(|d| d.success),
        })
    }

    async fn step(&mut self, task: &str, step: u32) -> MacAgentResult<StepReport> {
        // ── Perceive ──────────────────────────────────────────────────────
        if let Err(e) = self.context.get_state().await {
            tracing::warn!(step, error = %e, "perception failed, continuing with an empty state");
        }
        let state = self.context.state();
        self.history
            .save_step(step as usize, state.screenshot.as_ref(), state.annotated.as_ref(), &state.elements);

        // ── Infer ─────────────────────────────────────────────────────────
        let items = self.history.items();
        let actions = self.registry.describe_all();
        let elements = self.context.element_prompt();
        let messages = prompt::step_messages(&StepPrompt {
            profile: self.context.profile(),
            task,
            actions: &actions,
            history: self.settings.history.select(&items),
            elements: &elements,
            annotated: self.context.state().annotated.as_ref(),
            step,
            max_steps: self.settings.max_iterations,
        });
        let response = self
            .models
            .tools
            .chat(messages, vec![self.registry.tool_schema()])
            .await?;

        let Some(call) = response
            .tool_calls
            .into_iter()
            .find(|c| c.function.name == AGENT_OUTPUT_TOOL)
        else {
            tracing::warn!(step, content = %response.content, "no AgentOutput call in response");
            return Ok(StepReport::note(None, "Action error: model returned no structured action"));
        };
        let output: AgentOutput = match serde_json::from_str(&call.function.arguments) {
            Ok(output) => output,
            Err(e) => {
                return Ok(StepReport::note(
                    Some(call),
                    format!("Action error: invalid {AGENT_OUTPUT_TOOL} arguments: {e}"),
                ))
            }
        };
        tracing::info!(
            step,
            evaluation = %output.current_state.evaluation_previous_goal,
            next_goal = %output.current_state.next_goal,
            actions = output.action.len(),
            "model decided"
        );

        // ── Act ───────────────────────────────────────────────────────────
        let mut observations = Vec::new();
        let mut done = None;
        for (name, params) in output.calls() {
            let result = self
                .registry
                .execute(&name, params, &self.controller, &mut self.context)
                .await?;
            observations.extend(result.observations());
            if result.is_done {
                done = Some(result);
                break;
            }
        }

        Ok(StepReport {
            item: HistoryItem {
                tool_call: Some(call),
                observations,
            },
            done,
        })
    }

    async fn final_answer(&self, task: &str, done: Option<&ActionResult>) -> String {
        let items = self.history.items();
        let messages = prompt::final_answer_messages(task, self.settings.history.select(&items));
        match self.models.chat.chat(messages, Vec::new()).await {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, "final answer call failed");
                }
                done.and_then(|d| d.extracted_content.clone()).unwrap_or_else(|| {
                    format!(
                        "{} stopped after {} steps without completing the task",
                        self.context.profile().agent_name,
                        self.history.len()
                    )
                })
            }
        }
    }
}

/// Render a finished or failed run the way the planner receives it.
pub fn outcome_text(agent: &str, result: MacAgentResult<AgentRunOutcome>) -> String {
    match result {
        Ok(outcome) => outcome.answer,
        Err(e @ MacAgentError::AppLaunch(_)) => format!("{agent} could not start its application: {e}"),
        Err(e) => format!("{agent} failed: {e}"),
    }
}
