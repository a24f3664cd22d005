use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{MacAgentError, MacAgentResult};
use crate::llm::provider::{LlmProvider, RoleClient};
use crate::llm::providers::openai_compatible::{AuthStyle, OpenAiCompatibleProvider};
use crate::llm::types::CallConfig;

/// Agent roles that can be mapped to their own provider and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Top-level planner.
    Routing,
    /// Final-answer synthesis.
    Chat,
    /// Per-step structured action inference.
    Tools,
    /// Screenshot grounding for `computer_use`.
    Vision,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Routing => "routing",
            Role::Chat => "chat",
            Role::Tools => "tools",
            Role::Vision => "vision",
        }
    }
}

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
            llm_config: LlmConfig::default(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> MacAgentResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| MacAgentError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Provider and call configuration for a role.
    ///
    /// Resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. the active provider with its default model and temperature, non-streaming
    pub fn client_for(&self, role: Role) -> MacAgentResult<RoleClient> {
        let role_entry = match role {
            Role::Routing => self.llm_config.roles.routing.as_ref(),
            Role::Chat => self.llm_config.roles.chat.as_ref(),
            Role::Tools => self.llm_config.roles.tools.as_ref(),
            Role::Vision => self.llm_config.roles.vision.as_ref(),
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                MacAgentError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role.as_str(),
                    entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.1)
            });
            tracing::debug!(
                role = role.as_str(),
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature,
                "resolved role config"
            );
            return Ok(RoleClient {
                provider,
                config: CallConfig {
                    model: entry.model.clone(),
                    stream: entry.stream,
                    temperature,
                },
            });
        }

        let provider = self.get_active()?;
        let (model, temperature) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        tracing::debug!(
            role = role.as_str(),
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok(RoleClient {
            provider,
            config: CallConfig {
                model,
                stream: false,
                temperature,
            },
        })
    }

    /// Build a registry from the loaded config. API keys come from
    /// `MACAGENT_<ID>_API_KEY`, then the config entry.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("MACAGENT_{}_API_KEY", id.to_uppercase()))
                .ok()
                .filter(|k| !k.is_empty())
                .or_else(|| entry.api_key.clone())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }
            let provider = OpenAiCompatibleProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                AuthStyle::from_adapter(entry.adapter.as_deref()),
            );
            registry.register(Arc::new(provider));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderEntry, RoleEntry};

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.active_provider = "main".into();
        cfg.llm.providers.insert(
            "main".into(),
            ProviderEntry {
                display_name: "Main".into(),
                api_base: "http://localhost/v1/chat/completions".into(),
                model: "base-model".into(),
                temperature: 0.3,
                adapter: None,
                api_key: Some("k".into()),
            },
        );
        cfg.llm.roles.vision = Some(RoleEntry {
            provider: "main".into(),
            model: "vision-model".into(),
            stream: true,
            temperature: None,
        });
        cfg
    }

    #[test]
    fn configured_role_wins() {
        let registry = ProviderRegistry::from_config(&config());
        let client = registry.client_for(Role::Vision).unwrap();
        assert_eq!(client.config.model, "vision-model");
        assert!(client.config.stream);
        assert_eq!(client.config.temperature, 0.3);
    }

    #[test]
    fn unconfigured_role_uses_active_provider() {
        let registry = ProviderRegistry::from_config(&config());
        let client = registry.client_for(Role::Chat).unwrap();
        assert_eq!(client.config.model, "base-model");
        assert!(!client.config.stream);
        assert_eq!(registry.list_names(), vec!["main".to_string()]);
    }

    #[test]
    fn missing_provider_is_a_config_error() {
        let mut cfg = config();
        cfg.llm.roles.tools = Some(RoleEntry {
            provider: "ghost".into(),
            model: "m".into(),
            stream: false,
            temperature: None,
        });
        let registry = ProviderRegistry::from_config(&cfg);
        assert!(matches!(registry.client_for(Role::Tools), Err(MacAgentError::Config(_))));
        assert!(ProviderRegistry::new("none".into()).get_active().is_err());
    }
}
