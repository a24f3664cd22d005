use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::agent_engine::state::ActionResult;
use crate::apps::AppProfile;
use crate::controller::actions::Action;
use crate::controller::service::Controller;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::llm::types::ToolDef;
use crate::perception::context::AppContext;

/// Name of the single structured-output tool the agent model must call.
pub const AGENT_OUTPUT_TOOL: &str = "AgentOutput";

#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the parameter object.
    pub params: Value,
}

fn spec(name: &'static str, description: &'static str, params: Value) -> ActionSpec {
    ActionSpec {
        name,
        description,
        params,
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

fn index_only() -> Value {
    object(json!({"index": {"type": "integer"}}), &["index"])
}

/// Every action the controller understands.
fn catalog() -> Vec<ActionSpec> {
    vec![
        spec(
            "done",
            "Complete the task. text is the final report; success says whether the task was achieved",
            object(
                json!({"text": {"type": "string"}, "success": {"type": "boolean"}}),
                &["text"],
            ),
        ),
        spec("click_element", "Click the element with the given index", index_only()),
        spec("right_click_element", "Right-click the element with the given index", index_only()),
        spec(
            "input_text",
            "Type text into the element with the given index; end with \\n to press Enter",
            object(
                json!({"index": {"type": "integer"}, "text": {"type": "string"}}),
                &["index", "text"],
            ),
        ),
        spec(
            "scroll",
            "Scroll over the element with the given index; positive amount scrolls up, negative down",
            object(
                json!({"index": {"type": "integer"}, "amount": {"type": "integer"}}),
                &["index", "amount"],
            ),
        ),
        spec(
            "drag",
            "Drag from one element towards another; distance in [0, 1] is the fraction of the way to go",
            object(
                json!({
                    "source_index": {"type": "integer"},
                    "target_index": {"type": "integer"},
                    "distance": {"type": "number"}
                }),
                &["source_index", "target_index"],
            ),
        ),
        spec(
            "open_application",
            "Launch or activate the application, optionally opening a file",
            object(json!({"file_path": {"type": "string"}}), &[]),
        ),
        spec(
            "save",
            "Save the current document to file_path",
            object(json!({"file_path": {"type": "string"}}), &["file_path"]),
        ),
        spec(
            "save_and_close",
            "Save the current document to file_path and close it",
            object(json!({"file_path": {"type": "string"}}), &["file_path"]),
        ),
        spec(
            "hot_key",
            "Press a key combination, keys separated by spaces, e.g. \"command shift s\"",
            object(json!({"keys": {"type": "string"}}), &["keys"]),
        ),
        spec(
            "wait",
            "Wait for the given number of seconds",
            object(json!({"seconds": {"type": "integer"}}), &[]),
        ),
        spec(
            "computer_use",
            "Let a vision model perform one low-level step for a subgoal the element list cannot express",
            object(json!({"subgoal": {"type": "string"}}), &["subgoal"]),
        ),
        spec(
            "edit_document",
            "Edit the saved and closed document on disk; call save_and_close first",
            object(
                json!({
                    "operation": {"type": "string"},
                    "params": {"type": "object"},
                    "output_path": {"type": "string"}
                }),
                &["operation"],
            ),
        ),
        spec("paste", "Replace the content of the element with the clipboard", index_only()),
        spec("copy_text", "Copy all text of the element to the clipboard", index_only()),
        spec("send_message", "Click the element and press Enter to send", index_only()),
        spec(
            "move_item",
            "Move a file or folder into another folder",
            object(
                json!({"src_path": {"type": "string"}, "dst_folder": {"type": "string"}}),
                &["src_path", "dst_folder"],
            ),
        ),
        spec(
            "rename_item",
            "Rename a file or folder",
            object(
                json!({"path": {"type": "string"}, "new_name": {"type": "string"}}),
                &["path", "new_name"],
            ),
        ),
        spec(
            "trash_item",
            "Move a file or folder to the Trash",
            object(json!({"path": {"type": "string"}}), &["path"]),
        ),
        spec(
            "reveal",
            "Show a file or folder in a Finder window",
            object(json!({"path": {"type": "string"}}), &["path"]),
        ),
        spec(
            "copy_finder",
            "Put a file or folder on the clipboard",
            object(json!({"file_path": {"type": "string"}}), &["file_path"]),
        ),
        spec(
            "paste_finder",
            "Paste the file or folder on the clipboard into the folder at path",
            object(json!({"path": {"type": "string"}}), &["path"]),
        ),
        spec(
            "read_content",
            "Read the content currently shown by the application as text",
            object(json!({}), &[]),
        ),
        spec(
            "extract_text",
            "Extract the text of the given zero-based pages of a PDF file",
            object(
                json!({
                    "file_path": {"type": "string"},
                    "pages": {"type": "array", "items": {"type": "integer", "minimum": 0}}
                }),
                &["file_path", "pages"],
            ),
        ),
        spec(
            "search_keyword",
            "Return the content of every PDF page that contains the keyword",
            object(
                json!({"file_path": {"type": "string"}, "keyword": {"type": "string"}}),
                &["file_path", "keyword"],
            ),
        ),
        spec(
            "select_image",
            "Select a region inside the element by dragging; x, y, width and height are relative to the element",
            object(
                json!({
                    "index": {"type": "integer"},
                    "x": {"type": "number"},
                    "y": {"type": "number"},
                    "width": {"type": "number"},
                    "height": {"type": "number"}
                }),
                &["index", "x", "y", "width", "height"],
            ),
        ),
        spec(
            "create_calendar_event",
            "Create a calendar event; dates are YYYY-MM-DD or YYYY-MM-DDThh:mm:ss",
            object(
                json!({
                    "summary": {"type": "string"},
                    "description": {"type": "string"},
                    "date_start": {"type": "string"},
                    "date_end": {"type": "string"}
                }),
                &["summary", "date_start", "date_end"],
            ),
        ),
    ]
}

const GENERIC_ACTIONS: &[&str] = &[
    "done",
    "click_element",
    "right_click_element",
    "input_text",
    "scroll",
    "drag",
    "open_application",
    "save",
    "save_and_close",
    "hot_key",
    "wait",
    "computer_use",
];

/// The actions offered to one agent run.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<ActionSpec>,
    excluded: BTreeSet<String>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic actions plus the profile's own.
    pub fn for_profile(profile: &AppProfile) -> Self {
        let wanted: BTreeSet<&str> = GENERIC_ACTIONS
            .iter()
            .chain(profile.extra_actions)
            .copied()
            .collect();
        let mut registry = Self::new();
        for action in catalog().into_iter().filter(|s| wanted.contains(s.name)) {
            registry.register(action);
        }
        registry
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register(&mut self, spec: ActionSpec) {
        self.actions.retain(|a| a.name != spec.name);
        self.actions.push(spec);
    }

    pub fn exclude<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
    }

    pub fn available(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions
            .iter()
            .filter(|a| !self.excluded.contains(a.name))
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available().any(|a| a.name == name)
    }

    /// One line per action: `name: description. Parameters: {...}`.
    pub fn describe_all(&self) -> String {
        self.available()
            .map(|a| format!("{}: {}. Parameters: {}", a.name, a.description, a.params["properties"]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The `AgentOutput` function the model calls each step. Each `action`
    /// item is a one-key object naming the action.
    pub fn tool_schema(&self) -> ToolDef {
        let variants: Vec<Value> = self
            .available()
            .map(|a| {
                let mut properties = serde_json::Map::new();
                properties.insert(a.name.to_string(), a.params.clone());
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": [a.name],
                    "additionalProperties": false
                })
            })
            .collect();

        ToolDef::function(
            AGENT_OUTPUT_TOOL,
            "Report the current state and the next actions to execute in order",
            json!({
                "type": "object",
                "properties": {
                    "current_state": {
                        "type": "object",
                        "properties": {
                            "evaluation_previous_goal": {"type": "string"},
                            "memory": {"type": "string"},
                            "next_goal": {"type": "string"}
                        },
                        "required": ["evaluation_previous_goal", "memory", "next_goal"]
                    },
                    "action": {
                        "type": "array",
                        "minItems": 1,
                        "items": {"anyOf": variants}
                    }
                },
                "required": ["current_state", "action"]
            }),
        )
    }

    /// Validate `(name, params)` into an [`Action`].
    pub fn validate(&self, name: &str, params: Value) -> MacAgentResult<Action> {
        if !self.is_available(name) {
            return Err(MacAgentError::Validation(format!("unknown action '{name}'")));
        }
        Action::from_call(name, params)
            .map_err(|e| MacAgentError::Validation(format!("invalid parameters for '{name}': {e}")))
    }

    /// Validate and run one action. Only fatal errors (application launch)
    /// come back as `Err`; everything else is a failed [`ActionResult`].
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        controller: &Controller,
        context: &mut AppContext,
    ) -> MacAgentResult<ActionResult> {
        let action = match self.validate(name, params) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(action = name, error = %e, "action rejected");
                return Ok(ActionResult::failed(e.to_string()));
            }
        };
        tracing::info!(action = name, "executing action");
        match controller.act(action, context).await {
            Ok(result) => Ok(result),
            Err(e @ MacAgentError::AppLaunch(_)) => Err(e),
            Err(e) => {
                tracing::warn!(action = name, error = %e, "action failed");
                Ok(ActionResult::failed(e.to_string()))
            }
        }
    }
}
