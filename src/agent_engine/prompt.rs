// Message assembly for one ReAct step and for the closing answer.
use image::RgbaImage;
use serde_json::json;

use crate::agent_engine::history::HistoryItem;
use crate::apps::AppProfile;
use crate::controller::registry::AGENT_OUTPUT_TOOL;
use crate::llm::types::{ChatMessage, ContentPart, FunctionCall, ToolCall};
use crate::perception::screenshot::encode_png;

pub const HISTORY_START: &str = "[Your task history memory starts here]";
pub const HISTORY_END: &str = "[Task history ends here]";
const EXAMPLE_CALL_ID: &str = "example_call";

const SYSTEM_PROMPT: &str = "\
You are a precise macOS automation agent. You operate one application at a time through \
numbered interactive elements.

Each step you receive the list of elements as lines `[id]<role>description(visibility)</role>` \
and a screenshot in which every element is outlined and labelled with its id.

Rules:
- Always answer by calling the AgentOutput function exactly once.
- current_state.evaluation_previous_goal judges whether the last action worked, memory keeps \
what you need later, next_goal says what you do now.
- action is a list of one-key objects like {\"click_element\": {\"index\": 3}}, executed in order. \
Put several actions in one step only when the screen does not change between them.
- Only use ids from the current element list. Invisible elements must be scrolled into view first.
- When the task is complete, or cannot be completed, call done with a short report.";

/// Everything the step prompt is built from.
pub struct StepPrompt<'a> {
    pub profile: &'a AppProfile,
    pub task: &'a str,
    /// One line per available action.
    pub actions: &'a str,
    pub history: &'a [HistoryItem],
    pub elements: &'a str,
    pub annotated: Option<&'a RgbaImage>,
    pub step: u32,
    pub max_steps: u32,
}

fn example_call() -> ToolCall {
    let arguments = json!({
        "current_state": {
            "evaluation_previous_goal": "Unknown - nothing has been done yet",
            "memory": "Starting the task",
            "next_goal": "Click the element that leads towards the task"
        },
        "action": [{"click_element": {"index": 1}}]
    });
    ToolCall {
        id: EXAMPLE_CALL_ID.into(),
        call_type: "function".into(),
        function: FunctionCall {
            name: AGENT_OUTPUT_TOOL.into(),
            arguments: arguments.to_string(),
        },
    }
}

fn system_prompt(profile: &AppProfile) -> String {
    if profile.guidance.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{SYSTEM_PROMPT}\n\n{} notes:\n{}", profile.app_name, profile.guidance)
    }
}

/// Replay of past steps between the history markers.
fn history_messages(history: &[HistoryItem]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::user(HISTORY_START)];
    for item in history {
        match &item.tool_call {
            Some(call) => {
                messages.push(ChatMessage::assistant_tool_calls(vec![call.clone()]));
                messages.push(ChatMessage::tool(call.id.clone(), ""));
            }
            None => messages.push(ChatMessage::assistant("(no action was taken in this step)")),
        }
        messages.extend(item.observations.iter().map(ChatMessage::user));
    }
    messages.push(ChatMessage::user(HISTORY_END));
    messages
}

pub fn step_messages(p: &StepPrompt<'_>) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(system_prompt(p.profile)),
        ChatMessage::user(format!(
            "You are controlling {} on macOS. {}\n\nAvailable actions:\n{}",
            p.profile.app_name, p.profile.description, p.actions
        )),
        ChatMessage::user(format!("Task: {}", p.task)),
        ChatMessage::user("Example output:"),
        ChatMessage::assistant_tool_calls(vec![example_call()]),
        ChatMessage::tool(EXAMPLE_CALL_ID, "Click success!"),
    ];
    messages.extend(history_messages(p.history));

    let now = chrono::Local::now();
    let state = format!(
        "Current application: {}\nInteractive elements:\n{}\n\nCurrent step: {}/{}\nCurrent date and time: {}",
        p.profile.app_name,
        p.elements,
        p.step,
        p.max_steps,
        now.format("%Y-%m-%d %H:%M"),
    );
    let mut parts = vec![ContentPart::text(state)];
    if let Some(img) = p.annotated {
        match encode_png(img) {
            Ok(png) => parts.push(ContentPart::png(&png)),
            Err(e) => tracing::warn!(error = %e, "annotated screenshot not attached"),
        }
    }
    messages.push(ChatMessage::user_parts(parts));
    messages
}

/// Plain prompt asking for the final report of a finished (or abandoned) run.
pub fn final_answer_messages(task: &str, history: &[HistoryItem]) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(
            "You summarise the outcome of a desktop automation run. Answer in plain text: what was \
done, whether the task succeeded, and any result the user asked for.",
        ),
        ChatMessage::user(format!("Task: {task}")),
    ];
    messages.extend(history_messages(history));
    messages.push(ChatMessage::user("Write the final answer for the task now."));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::profiles;

    fn prompt<'a>(profile: &'a AppProfile, history: &'a [HistoryItem]) -> StepPrompt<'a> {
        StepPrompt {
            profile,
            task: "open the report",
            actions: "click_element: Click. Parameters: {}",
            history,
            elements: "[1]<AXButton>Open(visible)</AXButton>",
            annotated: None,
            step: 2,
            max_steps: 10,
        }
    }

    #[test]
    fn layout_has_example_then_history_then_state() {
        let profile = profiles::word();
        let call = ToolCall {
            id: "call_7".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: AGENT_OUTPUT_TOOL.into(),
                arguments: "{}".into(),
            },
        };
        let history = vec![
            HistoryItem {
                tool_call: Some(call.clone()),
                observations: vec!["Action result: Clicked element 1".into()],
            },
            HistoryItem {
                tool_call: None,
                observations: vec!["step timed out".into()],
            },
        ];
        let messages = step_messages(&prompt(&profile, &history));
        let texts: Vec<String> = messages.iter().map(ChatMessage::text).collect();

        assert_eq!(messages[0].role, "system");
        assert!(texts[0].contains(profile.guidance));
        assert_eq!(texts[2], "Task: open the report");
        assert_eq!(messages[5].tool_call_id.as_deref(), Some(EXAMPLE_CALL_ID));
        assert_eq!(texts[5], "Click success!");

        let start = texts.iter().position(|t| t == HISTORY_START).unwrap();
        assert_eq!(messages[start + 1].tool_calls.as_deref(), Some(&[call][..]));
        assert_eq!(messages[start + 2].role, "tool");
        assert_eq!(texts[start + 2], "");
        assert_eq!(texts[start + 3], "Action result: Clicked element 1");
        assert_eq!(messages[start + 4].role, "assistant");
        assert_eq!(texts[start + 5], "step timed out");
        assert_eq!(texts[start + 6], HISTORY_END);

        let last = texts.last().unwrap();
        assert!(last.contains("Current step: 2/10"));
        assert!(last.contains("[1]<AXButton>Open(visible)</AXButton>"));
    }

    #[test]
    fn annotated_image_is_attached() {
        let profile = profiles::preview();
        let img = RgbaImage::new(2, 2);
        let mut p = prompt(&profile, &[]);
        p.annotated = Some(&img);
        let messages = step_messages(&p);
        let v = serde_json::to_value(messages.last().unwrap()).unwrap();
        assert_eq!(v["content"][1]["type"], "image_url");
    }
}
