use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent_engine::history::HistoryPolicy;
use crate::errors::MacAgentResult;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions URL.
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "azure" switches authentication to the `api-key` header; None for OpenAI-compatible.
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var MACAGENT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Top-level planner choosing which application agent to call.
    pub routing: Option<RoleEntry>,
    /// Final-answer synthesis at the end of an agent run.
    pub chat: Option<RoleEntry>,
    /// Per-step structured action inference inside an application agent.
    pub tools: Option<RoleEntry>,
    /// Screenshot-only grounding used by the computer-use fallback.
    pub vision: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Use SSE streaming.
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Upper bound for one perceive → infer → act step.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
    #[serde(default)]
    pub history: HistoryPolicy,
    /// Screenshots, element lists and session logs are written here.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            step_timeout_secs: default_step_timeout(),
            history: HistoryPolicy::default(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

fn default_step_timeout() -> u64 {
    120
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self { max_depth: default_max_depth() }
    }
}

fn default_max_depth() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_planner_steps")]
    pub max_steps: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_steps: default_planner_steps() }
    }
}

fn default_planner_steps() -> u32 {
    20
}

/// External program that applies office-document edits.
/// It receives one JSON request on stdin and answers `{"success": bool, "message": str}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentsConfig {
    pub editor_command: Option<String>,
    #[serde(default)]
    pub editor_args: Vec<String>,
}

impl AppConfig {
    /// Overlay the `.env`-style provider variables on top of the file config.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        let server = get("API_SERVER_TYPE").map(|s| s.to_uppercase());
        match server.as_deref() {
            Some("AZURE") => {
                let Some(endpoint) = get("AZURE_ENDPOINT") else {
                    tracing::warn!("API_SERVER_TYPE=AZURE but AZURE_ENDPOINT is unset");
                    return;
                };
                let model = get("AZURE_MODEL").unwrap_or_else(|| "gpt-4o".into());
                let version = get("AZURE_API_VERSION").unwrap_or_else(|| "2024-02-15-preview".into());
                let api_base = format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    endpoint.trim_end_matches('/'),
                    model,
                    version
                );
                self.llm.providers.insert(
                    "azure".into(),
                    ProviderEntry {
                        display_name: "Azure OpenAI".into(),
                        api_base,
                        model,
                        temperature: 1.0,
                        adapter: Some("azure".into()),
                        api_key: get("AZURE_API_KEY"),
                    },
                );
                self.llm.active_provider = "azure".into();
                tracing::info!("LLM provider overridden from environment: azure");
            }
            Some("OPENAI") | None => {
                let Some(model) = get("MODEL") else {
                    return;
                };
                let base = get("API_BASE").unwrap_or_else(|| "https://api.openai.com/v1".into());
                let api_base = if base.ends_with("/chat/completions") {
                    base
                } else {
                    format!("{}/chat/completions", base.trim_end_matches('/'))
                };
                self.llm.providers.insert(
                    "openai".into(),
                    ProviderEntry {
                        display_name: "OpenAI".into(),
                        api_base,
                        model,
                        temperature: 1.0,
                        adapter: None,
                        api_key: get("API_KEY"),
                    },
                );
                self.llm.active_provider = "openai".into();
                tracing::info!("LLM provider overridden from environment: openai");
            }
            Some(other) => {
                tracing::warn!(server = other, "unknown API_SERVER_TYPE, ignoring");
            }
        }
    }
}

fn resolve_config_path() -> MacAgentResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Load `config.toml` (or defaults when absent) and overlay environment variables.
pub fn load_config() -> MacAgentResult<AppConfig> {
    let mut config = match resolve_config_path()? {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
            config
        }
        None => {
            tracing::info!("config.toml not found, using defaults");
            AppConfig::default()
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [llm]
            active_provider = "local"

            [llm.providers.local]
            display_name = "Local"
            api_base = "http://localhost:8000/v1/chat/completions"
            model = "qwen-vl"

            [llm.roles.vision]
            provider = "local"
            model = "qwen-vl-max"

            [agent]
            max_iterations = 4
            history = { keep_last = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(cfg.agent.max_iterations, 4);
        assert_eq!(cfg.agent.step_timeout_secs, 120);
        assert_eq!(cfg.agent.history, HistoryPolicy::KeepLast(3));
        assert_eq!(cfg.perception.max_depth, 10);
        assert_eq!(cfg.planner.max_steps, 20);
        assert_eq!(cfg.llm.providers["local"].temperature, 0.1);
        assert!(!cfg.llm.roles.vision.as_ref().unwrap().stream);
    }

    #[test]
    fn azure_env_builds_deployment_url() {
        let env: HashMap<&str, &str> = [
            ("API_SERVER_TYPE", "azure"),
            ("AZURE_ENDPOINT", "https://example.openai.azure.com/"),
            ("AZURE_MODEL", "gpt-4o"),
            ("AZURE_API_VERSION", "2024-05-01"),
            ("AZURE_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.llm.active_provider, "azure");
        let entry = &cfg.llm.providers["azure"];
        assert_eq!(
            entry.api_base,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-05-01"
        );
        assert_eq!(entry.adapter.as_deref(), Some("azure"));
        assert_eq!(entry.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn openai_env_needs_model() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides_from(|_| None);
        assert!(cfg.llm.providers.is_empty());

        cfg.apply_overrides_from(|k| match k {
            "MODEL" => Some("gpt-4o-mini".into()),
            "API_BASE" => Some("https://proxy.local/v1/".into()),
            _ => None,
        });
        assert_eq!(cfg.llm.active_provider, "openai");
        assert_eq!(
            cfg.llm.providers["openai"].api_base,
            "https://proxy.local/v1/chat/completions"
        );
    }
}
