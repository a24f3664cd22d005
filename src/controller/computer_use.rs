/// Screenshot-grounded fallback: a vision model answers with low-level
/// pointer/keyboard steps in absolute screen coordinates, which are parsed
/// into [`LowLevelAction`] and performed directly through the input driver.
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::agent_engine::state::ActionResult;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::executor::input::{parse_chord, ClickStyle, InputDriver, Key, ScreenPoint};
use crate::llm::provider::RoleClient;
use crate::llm::types::{ChatMessage, ContentPart};
use crate::perception::screenshot::encode_png;
use crate::perception::types::ContextState;

const SETTLE: Duration = Duration::from_millis(500);
const WAIT_STEP: Duration = Duration::from_secs(5);
const SCROLL_CLICKS: i32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum LowLevelAction {
    Click(ScreenPoint, ClickStyle),
    Hover(ScreenPoint),
    Input { text: String, at: Option<ScreenPoint> },
    Scroll { at: Option<ScreenPoint>, up: bool },
    Drag { from: ScreenPoint, to: ScreenPoint },
    HotKey(Vec<Key>),
    Enter,
    Wait,
    Finish,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action_type: String,
    #[serde(default)]
    action_inputs: RawInputs,
}

#[derive(Debug, Deserialize, Default)]
struct RawInputs {
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    position: Option<Position>,
}

/// `[x, y]`, `[[x, y]]`, `[[x1, y1], [x2, y2]]` or a placeholder such as `"N/A"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Position {
    Point([f64; 2]),
    Points(Vec<[f64; 2]>),
    NotApplicable(String),
}

impl Position {
    fn points(&self) -> Vec<ScreenPoint> {
        let to_point = |p: &[f64; 2]| ScreenPoint::new(p[0].round() as i32, p[1].round() as i32);
        match self {
            Position::Point(p) => vec![to_point(p)],
            Position::Points(ps) => ps.iter().map(to_point).collect(),
            Position::NotApplicable(text) => {
                tracing::debug!(placeholder = %text, "action carries no position");
                Vec::new()
            }
        }
    }
}

fn text_value(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if s != "N/A" && !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl RawAction {
    fn into_action(self) -> MacAgentResult<LowLevelAction> {
        let inputs = self.action_inputs;
        let points = inputs.position.as_ref().map(Position::points).unwrap_or_default();
        let first = points.first().copied();
        let need_point = || {
            first.ok_or_else(|| {
                MacAgentError::Parse(format!("{} requires a position", self.action_type))
            })
        };

        let action = match self.action_type.to_uppercase().as_str() {
            "CLICK" | "LEFT_CLICK_SINGLE" => LowLevelAction::Click(need_point()?, ClickStyle::LeftSingle),
            "LEFT_CLICK_DOUBLE" => LowLevelAction::Click(need_point()?, ClickStyle::LeftDouble),
            "RIGHT_CLICK_SINGLE" => LowLevelAction::Click(need_point()?, ClickStyle::RightSingle),
            "HOVER" => LowLevelAction::Hover(need_point()?),
            "INPUT" => LowLevelAction::Input {
                text: text_value(&inputs.value)
                    .ok_or_else(|| MacAgentError::Parse("INPUT requires a value".into()))?,
                at: first,
            },
            "SCROLL" => {
                let direction = inputs
                    .direction
                    .or_else(|| text_value(&inputs.value))
                    .unwrap_or_default()
                    .to_lowercase();
                LowLevelAction::Scroll {
                    at: first,
                    up: direction.contains("up"),
                }
            }
            "DRAG" | "SELECT" => match points.as_slice() {
                [from, to] => LowLevelAction::Drag { from: *from, to: *to },
                _ => {
                    return Err(MacAgentError::Parse(
                        "DRAG requires a start and an end position".into(),
                    ))
                }
            },
            "HOT_KEY" => {
                let keys = text_value(&inputs.value)
                    .ok_or_else(|| MacAgentError::Parse("HOT_KEY requires a value".into()))?;
                LowLevelAction::HotKey(parse_chord(&keys)?)
            }
            "ENTER" => LowLevelAction::Enter,
            "WAIT" => LowLevelAction::Wait,
            "FINISH" => LowLevelAction::Finish,
            other => {
                return Err(MacAgentError::Parse(format!("unknown action type '{other}'")))
            }
        };
        Ok(action)
    }
}

/// Parse the JSON after the last `Action:` marker. Accepts one object or an array.
pub fn parse_response(content: &str) -> MacAgentResult<Vec<LowLevelAction>> {
    let (_, tail) = content
        .rsplit_once("Action:")
        .ok_or_else(|| MacAgentError::Parse("response has no 'Action:' section".into()))?;
    let json = tail
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: Value = serde_json::from_str(json)
        .map_err(|e| MacAgentError::Parse(format!("action JSON: {e}")))?;
    let raws: Vec<RawAction> = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    raws.into_iter().map(RawAction::into_action).collect()
}

/// Perform the steps in order. Returns `true` if the model declared the subgoal finished.
pub async fn perform(actions: &[LowLevelAction], input: &dyn InputDriver) -> MacAgentResult<bool> {
    for action in actions {
        tracing::debug!(?action, "low-level step");
        match action {
            LowLevelAction::Click(at, style) => input.click(*at, *style).await?,
            LowLevelAction::Hover(at) => input.move_to(*at).await?,
            LowLevelAction::Input { text, at } => {
                if let Some(at) = at {
                    input.click(*at, ClickStyle::LeftSingle).await?;
                }
                let press_enter = text.ends_with('\n') || text.ends_with("\\n");
                let body = text.trim_end_matches("\\n").trim();
                input.set_clipboard(body).await?;
                tokio::time::sleep(SETTLE).await;
                input.key_chord(&[Key::Command, Key::Char('v')]).await?;
                if press_enter {
                    tokio::time::sleep(SETTLE).await;
                    input.key_chord(&[Key::Enter]).await?;
                }
            }
            LowLevelAction::Scroll { at, up } => {
                if let Some(at) = at {
                    input.click(*at, ClickStyle::LeftSingle).await?;
                }
                input.scroll(if *up { SCROLL_CLICKS } else { -SCROLL_CLICKS }).await?;
            }
            LowLevelAction::Drag { from, to } => input.drag(*from, *to).await?,
            LowLevelAction::HotKey(keys) => input.key_chord(keys).await?,
            LowLevelAction::Enter => input.key_chord(&[Key::Enter]).await?,
            LowLevelAction::Wait => tokio::time::sleep(WAIT_STEP).await,
            LowLevelAction::Finish => return Ok(true),
        }
        tokio::time::sleep(SETTLE).await;
    }
    Ok(false)
}

fn system_prompt(state: &ContextState) -> String {
    format!(
        "You are an AI agent automating a GUI task on macOS. You see a clean screenshot of one \
application window and the same screenshot with numbered element boxes. The window is offset \
on screen by x: {x}, y: {y}; every position you output must be in screen coordinates, so add \
this offset to positions measured on the screenshot, and aim for the middle of elements.

Action space:
1. CLICK: left click, position [x,y] required.
2. LEFT_CLICK_DOUBLE: double left click, position required.
3. RIGHT_CLICK_SINGLE: right click, position required.
4. INPUT: paste value as text; optional position to click first.
5. SCROLL: direction 'up' or 'down'; optional start position.
6. DRAG: position [[x1,y1],[x2,y2]] from start to end.
7. HOT_KEY: value is the key combination, e.g. 'command v'.
8. ENTER: press Enter.
9. WAIT: wait 5 seconds.
10. FINISH: the subgoal is achieved.

Output format:
Thought: <reasoning>
Element: <element id>
Action: [{{\"action_type\": <type>, \"action_inputs\": {{\"value\": <text or \"N/A\">, \"direction\": <\"up\", \"down\" or \"N/A\">, \"position\": <[x,y] or \"N/A\">}}}}]",
        x = state.window_offset.x,
        y = state.window_offset.y
    )
}

/// Ask the vision model for low-level steps towards `subgoal` and perform them.
pub async fn run(
    subgoal: &str,
    state: &ContextState,
    vision: &RoleClient,
    input: &dyn InputDriver,
) -> MacAgentResult<ActionResult> {
    let (Some(clean), Some(annotated)) = (&state.screenshot, &state.annotated) else {
        return Ok(ActionResult::failed("computer_use needs a screenshot of the application"));
    };

    let messages = vec![
        ChatMessage::system(system_prompt(state)),
        ChatMessage::user_parts(vec![
            ContentPart::text(subgoal),
            ContentPart::png(&encode_png(clean)?),
            ContentPart::png(&encode_png(annotated)?),
        ]),
    ];
    let response = vision.chat(messages, Vec::new()).await?;
    tracing::debug!(content = %response.content, "computer_use response");

    let actions = parse_response(&response.content)?;
    let finished = perform(&actions, input).await?;
    tracing::info!(steps = actions.len(), finished, "computer_use performed");
    Ok(ActionResult::ok(format!(
        "Performed {} low-level action(s) for: {subgoal}",
        actions.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::input::recording::{InputEvent, RecordingInput};

    #[test]
    fn parses_actions_after_marker() {
        let content = r#"Thought: the save button is at the top.
Element: 12
Action: [{"action_type": "CLICK", "action_inputs": {"value": "N/A", "direction": "N/A", "position": [310.4, 88]}},
         {"action_type": "HOT_KEY", "action_inputs": {"value": "command s", "position": "N/A"}}]"#;
        let actions = parse_response(content).unwrap();
        assert_eq!(
            actions,
            vec![
                LowLevelAction::Click(ScreenPoint::new(310, 88), ClickStyle::LeftSingle),
                LowLevelAction::HotKey(vec![Key::Command, Key::Char('s')]),
            ]
        );
    }

    #[test]
    fn positions_accept_nested_and_pairs() {
        let single = parse_response(
            r#"Action: {"action_type": "RIGHT_CLICK_SINGLE", "action_inputs": {"position": [[5, 6]]}}"#,
        )
        .unwrap();
        assert_eq!(single, vec![LowLevelAction::Click(ScreenPoint::new(5, 6), ClickStyle::RightSingle)]);

        let drag = parse_response(
            r#"Action: [{"action_type": "DRAG", "action_inputs": {"position": [[0, 0], [100, 50]]}}]"#,
        )
        .unwrap();
        assert_eq!(
            drag,
            vec![LowLevelAction::Drag {
                from: ScreenPoint::new(0, 0),
                to: ScreenPoint::new(100, 50)
            }]
        );
    }

    #[test]
    fn malformed_responses_are_parse_errors() {
        assert!(matches!(parse_response("I would click it"), Err(MacAgentError::Parse(_))));
        assert!(parse_response("Action: [{\"action_type\": \"CLICK\", \"action_inputs\": {}}]").is_err());
        assert!(parse_response("Action: [{\"action_type\": \"TELEPORT\"}]").is_err());
        assert!(parse_response(
            r#"Action: [{"action_type": "DRAG", "action_inputs": {"position": [[1, 2]]}}]"#
        )
        .is_err());
    }

    #[test]
    fn scroll_direction_and_code_fences() {
        let actions = parse_response(
            "Action: ```json\n[{\"action_type\": \"SCROLL\", \"action_inputs\": {\"direction\": \"down\", \"position\": \"N/A\"}}]\n```",
        )
        .unwrap();
        assert_eq!(actions, vec![LowLevelAction::Scroll { at: None, up: false }]);
    }

    #[tokio::test]
    async fn perform_stops_at_finish() {
        let input = RecordingInput::default();
        let actions = vec![
            LowLevelAction::Input {
                text: "hello\n".into(),
                at: Some(ScreenPoint::new(1, 2)),
            },
            LowLevelAction::Finish,
            LowLevelAction::Enter,
        ];
        assert!(perform(&actions, &input).await.unwrap());
        assert_eq!(
            input.take(),
            vec![
                InputEvent::Click(ScreenPoint::new(1, 2), ClickStyle::LeftSingle),
                InputEvent::Clipboard("hello".into()),
                InputEvent::Chord(vec![Key::Command, Key::Char('v')]),
                InputEvent::Chord(vec![Key::Enter]),
            ]
        );
    }
}
