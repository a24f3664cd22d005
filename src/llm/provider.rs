use async_trait::async_trait;

use crate::errors::MacAgentResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, ToolDef};

/// Unified LLM provider trait. New providers implement this and are
/// registered from config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (the config.toml key).
    fn name(&self) -> &str;

    /// One chat completion. Streaming, when `cfg.stream` is set, is
    /// accumulated before returning.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
        cfg: &CallConfig,
    ) -> MacAgentResult<LlmResponse>;
}

/// A provider paired with the call settings of one role.
#[derive(Clone)]
pub struct RoleClient {
    pub provider: std::sync::Arc<dyn LlmProvider>,
    pub config: CallConfig,
}

impl RoleClient {
    pub async fn chat(&self, messages: Vec<ChatMessage>, tools: Vec<ToolDef>) -> MacAgentResult<LlmResponse> {
        self.provider.chat(messages, tools, &self.config).await
    }
}
