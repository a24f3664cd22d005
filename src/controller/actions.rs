use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A validated action. The externally-tagged layout matches the one-key
/// objects the model emits: `{"click_element": {"index": 3}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Done {
        text: String,
        #[serde(default = "yes")]
        success: bool,
    },
    ClickElement {
        index: u32,
    },
    RightClickElement {
        index: u32,
    },
    InputText {
        index: u32,
        text: String,
    },
    Scroll {
        index: u32,
        /// Positive scrolls up.
        amount: i32,
    },
    Drag {
        source_index: u32,
        target_index: u32,
        /// Fraction of the way towards the target, clamped to `[0, 1]`.
        #[serde(default = "full_distance")]
        distance: f64,
    },
    OpenApplication {
        #[serde(default)]
        file_path: Option<PathBuf>,
    },
    Save {
        file_path: PathBuf,
    },
    SaveAndClose {
        file_path: PathBuf,
    },
    HotKey {
        keys: String,
    },
    Wait {
        #[serde(default = "default_wait")]
        seconds: u64,
    },
    ComputerUse {
        subgoal: String,
    },
    EditDocument {
        operation: String,
        #[serde(default)]
        params: serde_json::Value,
        #[serde(default)]
        output_path: Option<PathBuf>,
    },
    Paste {
        index: u32,
    },
    CopyText {
        index: u32,
    },
    SendMessage {
        index: u32,
    },
    MoveItem {
        src_path: PathBuf,
        dst_folder: PathBuf,
    },
    RenameItem {
        path: PathBuf,
        new_name: String,
    },
    TrashItem {
        path: PathBuf,
    },
    Reveal {
        path: PathBuf,
    },
    CopyFinder {
        file_path: PathBuf,
    },
    PasteFinder {
        /// Destination folder.
        path: PathBuf,
    },
    ReadContent {},
    ExtractText {
        file_path: PathBuf,
        /// Zero-based page numbers.
        pages: Vec<usize>,
    },
    SearchKeyword {
        file_path: PathBuf,
        keyword: String,
    },
    /// Rectangle relative to the element's top-left corner.
    SelectImage {
        index: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    CreateCalendarEvent {
        summary: String,
        #[serde(default)]
        description: String,
        date_start: String,
        date_end: String,
    },
}

fn yes() -> bool {
    true
}

fn full_distance() -> f64 {
    1.0
}

fn default_wait() -> u64 {
    3
}

impl Action {
    /// Build from a `(name, params)` pair as listed in `AgentOutput.action`.
    pub fn from_call(name: &str, params: serde_json::Value) -> serde_json::Result<Action> {
        let params = if params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            params
        };
        let mut tagged = serde_json::Map::new();
        tagged.insert(name.to_string(), params);
        serde_json::from_value(serde_json::Value::Object(tagged))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Done { .. } => "done",
            Action::ClickElement { .. } => "click_element",
            Action::RightClickElement { .. } => "right_click_element",
            Action::InputText { .. } => "input_text",
            Action::Scroll { .. } => "scroll",
            Action::Drag { .. } => "drag",
            Action::OpenApplication { .. } => "open_application",
            Action::Save { .. } => "save",
            Action::SaveAndClose { .. } => "save_and_close",
            Action::HotKey { .. } => "hot_key",
            Action::Wait { .. } => "wait",
            Action::ComputerUse { .. } => "computer_use",
            Action::EditDocument { .. } => "edit_document",
            Action::Paste { .. } => "paste",
            Action::CopyText { .. } => "copy_text",
            Action::SendMessage { .. } => "send_message",
            Action::MoveItem { .. } => "move_item",
            Action::RenameItem { .. } => "rename_item",
            Action::TrashItem { .. } => "trash_item",
            Action::Reveal { .. } => "reveal",
            Action::CopyFinder { .. } => "copy_finder",
            Action::PasteFinder { .. } => "paste_finder",
            Action::ReadContent {} => "read_content",
            Action::ExtractText { .. } => "extract_text",
            Action::SearchKeyword { .. } => "search_keyword",
            Action::SelectImage { .. } => "select_image",
            Action::CreateCalendarEvent { .. } => "create_calendar_event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calls_deserialize_into_variants() {
        assert_eq!(
            Action::from_call("click_element", json!({"index": 4})).unwrap(),
            Action::ClickElement { index: 4 }
        );
        assert_eq!(
            Action::from_call("drag", json!({"source_index": 1, "target_index": 2})).unwrap(),
            Action::Drag {
                source_index: 1,
                target_index: 2,
                distance: 1.0
            }
        );
        assert_eq!(
            Action::from_call("open_application", serde_json::Value::Null).unwrap(),
            Action::OpenApplication { file_path: None }
        );
        assert_eq!(
            Action::from_call("read_content", serde_json::Value::Null).unwrap(),
            Action::ReadContent {}
        );
        assert_eq!(
            Action::from_call("extract_text", json!({"file_path": "/tmp/a.pdf", "pages": [0, 2]})).unwrap(),
            Action::ExtractText {
                file_path: PathBuf::from("/tmp/a.pdf"),
                pages: vec![0, 2]
            }
        );
        let done = Action::from_call("done", json!({"text": "ok"})).unwrap();
        assert_eq!(done, Action::Done { text: "ok".into(), success: true });
        assert_eq!(done.name(), "done");
    }

    #[test]
    fn bad_params_are_rejected() {
        assert!(Action::from_call("click_element", json!({"index": "three"})).is_err());
        assert!(Action::from_call("click_element", json!({})).is_err());
        assert!(Action::from_call("launch_rockets", json!({})).is_err());
        assert!(Action::from_call("extract_text", json!({"file_path": "/tmp/a.pdf", "pages": [-1]})).is_err());
    }
}
