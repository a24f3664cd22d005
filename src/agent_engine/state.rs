use serde::{Deserialize, Serialize};

/// Outcome of one executed action.
///
/// `is_done` is the only termination signal; `success` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionResult {
    pub is_done: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    pub include_in_memory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            extracted_content: Some(content.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    pub fn done(text: impl Into<String>, success: bool) -> Self {
        Self {
            is_done: true,
            success,
            extracted_content: Some(text.into()),
            include_in_memory: true,
            error: None,
        }
    }

    /// Observation strings for the history, in prompt order.
    pub fn observations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.include_in_memory {
            if let Some(content) = &self.extracted_content {
                out.push(format!("Action result: {content}"));
            }
        }
        if let Some(error) = &self.error {
            out.push(format!("Action error: {error}"));
        }
        out
    }
}

/// Model self-assessment carried in every `AgentOutput` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CurrentState {
    #[serde(default)]
    pub evaluation_previous_goal: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub next_goal: String,
}

/// Arguments of the `AgentOutput` tool: state plus an ordered action list,
/// each entry a one-key object `{action_name: params}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    #[serde(default)]
    pub current_state: CurrentState,
    pub action: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl AgentOutput {
    /// `(name, params)` pairs in order. Entries that are not one-key objects
    /// come back with an empty name so the registry reports them.
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.action
            .iter()
            .map(|entry| match entry.iter().next() {
                Some((name, params)) if entry.len() == 1 => (name.clone(), params.clone()),
                _ => (String::new(), serde_json::Value::Object(entry.clone())),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunOutcome {
    pub answer: String,
    pub steps: usize,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observations_follow_memory_flag() {
        assert_eq!(ActionResult::ok("clicked").observations(), vec!["Action result: clicked"]);

        let quiet = ActionResult {
            include_in_memory: false,
            ..ActionResult::ok("hidden")
        };
        assert!(quiet.observations().is_empty());

        assert_eq!(
            ActionResult::failed("Element with index 9 not found").observations(),
            vec!["Action error: Element with index 9 not found"]
        );
    }

    #[test]
    fn agent_output_calls_keep_order() {
        let out: AgentOutput = serde_json::from_value(json!({
            "current_state": {"evaluation_previous_goal": "ok", "memory": "", "next_goal": "type"},
            "action": [
                {"click_element": {"index": 3}},
                {"input_text": {"index": 3, "text": "hi"}},
                {"a": {}, "b": {}}
            ]
        }))
        .unwrap();
        let calls = out.calls();
        assert_eq!(calls[0].0, "click_element");
        assert_eq!(calls[1], ("input_text".to_string(), json!({"index": 3, "text": "hi"})));
        assert_eq!(calls[2].0, "");
    }
}
