/// Top-level planner: a tool-calling loop in which every application agent is
/// one function tool taking a natural-language `instruction`.
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::agent_engine::engine::{outcome_text, AgentModels, AgentSettings, ReactAgent};
use crate::agent_engine::history::SessionHistory;
use crate::apps::AppProfile;
use crate::config::AppConfig;
use crate::controller::registry::ActionRegistry;
use crate::controller::service::Controller;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::executor::applescript::ScriptRunner;
use crate::executor::document::DocumentEditor;
use crate::executor::input::InputDriver;
use crate::llm::provider::RoleClient;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::types::{ChatMessage, ToolDef};
use crate::perception::context::{AppContext, AppSession};

const PLANNER_PROMPT: &str = "\
You are a planner that completes tasks on a Mac by delegating to application agents.

Each agent controls one application and takes a single natural-language instruction. \
Give each agent a self-contained instruction with every file path, name and text it needs; \
agents do not see each other's work. Call agents one at a time and read their reports before \
deciding the next step. When the task is complete, or cannot be completed, answer in plain text \
without calling any agent.";

/// One application agent as seen by the planner.
#[async_trait]
pub trait AppAgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the agent on `instruction` and report back in plain text. Failures
    /// are reported in the text, never raised.
    async fn forward(&self, instruction: &str) -> String;
}

pub fn tool_def(tool: &dyn AppAgentTool) -> ToolDef {
    ToolDef::function(
        tool.name(),
        tool.description(),
        json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "What the agent should do, with all paths and text it needs"
                }
            },
            "required": ["instruction"]
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ForwardArgs {
    instruction: String,
}

pub type SessionFactory = Arc<dyn Fn(&AppProfile) -> Box<dyn AppSession> + Send + Sync>;

/// Collaborators shared by every application agent of one process run.
#[derive(Clone)]
pub struct AgentRuntime {
    pub models: AgentModels,
    pub vision: Option<RoleClient>,
    pub settings: AgentSettings,
    pub max_depth: usize,
    pub results_dir: PathBuf,
    pub run_id: String,
    pub input: Arc<dyn InputDriver>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub editor: Arc<dyn DocumentEditor>,
    pub sessions: SessionFactory,
}

impl AgentRuntime {
    /// Resolve the model roles from the registry. Tools and chat are required;
    /// without a vision model `computer_use` is withheld from the agents.
    pub fn from_config(
        config: &AppConfig,
        registry: &ProviderRegistry,
        run_id: String,
        input: Arc<dyn InputDriver>,
        scripts: Arc<dyn ScriptRunner>,
        editor: Arc<dyn DocumentEditor>,
        sessions: SessionFactory,
    ) -> MacAgentResult<Self> {
        let models = AgentModels {
            tools: registry.client_for(Role::Tools)?,
            chat: registry.client_for(Role::Chat)?,
        };
        let vision = match registry.client_for(Role::Vision) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "no vision model, computer_use disabled");
                None
            }
        };
        Ok(Self {
            models,
            vision,
            settings: AgentSettings::from(&config.agent),
            max_depth: config.perception.max_depth,
            results_dir: config.agent.results_dir.clone(),
            run_id,
            input,
            scripts,
            editor,
            sessions,
        })
    }
}

/// An [`AppAgentTool`] that builds a fresh context, controller and registry
/// for every call, so no state leaks between instructions.
pub struct AppAgent {
    profile: AppProfile,
    runtime: Arc<AgentRuntime>,
}

impl AppAgent {
    pub fn new(profile: AppProfile, runtime: Arc<AgentRuntime>) -> Self {
        Self { profile, runtime }
    }

    fn build(&self) -> ReactAgent {
        let rt = &self.runtime;
        let context = AppContext::new((rt.sessions)(&self.profile), self.profile.clone(), rt.max_depth);
        let controller = Controller::new(
            rt.input.clone(),
            rt.scripts.clone(),
            rt.editor.clone(),
            rt.vision.clone(),
        );
        let mut registry = ActionRegistry::for_profile(&self.profile);
        if rt.vision.is_none() {
            registry.exclude(["computer_use"]);
        }
        let history = SessionHistory::new(&rt.results_dir, &rt.run_id, self.profile.agent_name);
        ReactAgent::new(context, controller, registry, rt.models.clone(), rt.settings, history)
    }
}

#[async_trait]
impl AppAgentTool for AppAgent {
    fn name(&self) -> &str {
        self.profile.agent_name
    }

    fn description(&self) -> &str {
        self.profile.description
    }

    async fn forward(&self, instruction: &str) -> String {
        tracing::info!(agent = self.profile.agent_name, instruction, "forwarding to application agent");
        let mut agent = self.build();
        outcome_text(self.profile.agent_name, agent.run(instruction).await)
    }
}

pub struct Planner {
    routing: RoleClient,
    tools: Vec<Arc<dyn AppAgentTool>>,
    max_steps: u32,
}

impl Planner {
    pub fn new(routing: RoleClient, tools: Vec<Arc<dyn AppAgentTool>>, max_steps: u32) -> Self {
        Self {
            routing,
            tools,
            max_steps,
        }
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn AppAgentTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    async fn call_tool(&self, name: &str, arguments: &str) -> String {
        let Some(tool) = self.find(name) else {
            tracing::warn!(tool = name, "planner called an unknown agent");
            return format!("Unknown agent '{name}'");
        };
        match serde_json::from_str::<ForwardArgs>(arguments) {
            Ok(args) => tool.forward(&args.instruction).await,
            Err(e) => format!("Invalid arguments for {name}: {e}"),
        }
    }

    /// Returns the planner's final plain-text answer.
    pub async fn run(&self, task: &str) -> MacAgentResult<String> {
        let defs: Vec<ToolDef> = self.tools.iter().map(|t| tool_def(t.as_ref())).collect();
        let mut messages = vec![ChatMessage::system(PLANNER_PROMPT), ChatMessage::user(task)];

        for step in 1..=self.max_steps {
            let response = self.routing.chat(messages.clone(), defs.clone()).await?;
            if response.tool_calls.is_empty() {
                tracing::info!(step, "planner finished");
                return Ok(response.content);
            }

            messages.push(ChatMessage::assistant_tool_calls(response.tool_calls.clone()));
            for call in response.tool_calls {
                tracing::info!(step, agent = %call.function.name, "planner dispatch");
                let reply = self.call_tool(&call.function.name, &call.function.arguments).await;
                tracing::debug!(agent = %call.function.name, reply = %reply, "agent replied");
                messages.push(ChatMessage::tool(call.id, reply));
            }
        }

        Err(MacAgentError::Agent(format!(
            "planner did not finish within {} steps",
            self.max_steps
        )))
    }
}
