pub mod agent_engine;
pub mod apps;
pub mod config;
pub mod controller;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod planner;

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::errors::MacAgentResult;
use crate::executor::applescript::{OsaScript, ScriptRunner};
use crate::executor::document::{DocumentEditor, ExternalEditor, NoEditor};
use crate::executor::input::platform_driver;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::perception::context::platform_session;
use crate::planner::{AgentRuntime, AppAgent, AppAgentTool, Planner};

/// Console logging, plus `<log_dir>/macagent.log` when a directory is given.
/// `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, log_dir: Option<&Path>) -> MacAgentResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("macagent.log"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();
    Ok(())
}

/// Wire the planner and one agent per application profile from config.
pub fn build_planner(config: &AppConfig, run_id: String) -> MacAgentResult<Planner> {
    let registry = ProviderRegistry::from_config(config);
    tracing::info!(providers = ?registry.list_names(), "LLM providers registered");

    let scripts: Arc<dyn ScriptRunner> = Arc::new(OsaScript);
    let editor: Arc<dyn DocumentEditor> = match &config.documents.editor_command {
        Some(cmd) => Arc::new(ExternalEditor::new(cmd.clone(), config.documents.editor_args.clone())),
        None => Arc::new(NoEditor),
    };
    let session_scripts = scripts.clone();
    let runtime = AgentRuntime::from_config(
        config,
        &registry,
        run_id,
        Arc::from(platform_driver()),
        scripts,
        editor,
        Arc::new(move |profile: &apps::AppProfile| platform_session(profile.app_name, session_scripts.clone())),
    )?;
    let runtime = Arc::new(runtime);

    let tools: Vec<Arc<dyn AppAgentTool>> = apps::profiles::all()
        .into_iter()
        .map(|profile| Arc::new(AppAgent::new(profile, runtime.clone())) as Arc<dyn AppAgentTool>)
        .collect();

    Ok(Planner::new(
        registry.client_for(Role::Routing)?,
        tools,
        config.planner.max_steps,
    ))
}
