use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Roles treated as interactive even when the element exposes no press action.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "AXButton",
    "AXLink",
    "AXTextField",
    "AXTextArea",
    "AXCheckBox",
    "AXRadioButton",
    "AXComboBox",
    "AXSlider",
    "AXMenu",
    "AXMenuItem",
    "AXPopUpButton",
];

/// `(x, y, width, height)` in screen points.
///
/// The coordinate frame (window-local or screen-absolute) is not encoded in
/// the type; `ElementRecord` carries both frames explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Area of the overlap with `other`, zero when they only touch.
    pub fn intersection_area(&self, other: &ScreenRect) -> f64 {
        let ix = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let iy = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if ix <= 0.0 || iy <= 0.0 {
            0.0
        } else {
            ix * iy
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// Screen-absolute origin of the captured window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct WindowOffset {
    pub x: f64,
    pub y: f64,
}

/// One native UI element captured during a perception cycle.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessibilityNode {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub is_interactive: bool,
    /// Native bounds descriptor, e.g. the `AXFrame` description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<AccessibilityNode>,
}

impl AccessibilityNode {
    pub fn role_description(&self) -> Option<&str> {
        self.attributes.get("AXRoleDescription").map(String::as_str)
    }

    pub fn subrole(&self) -> Option<&str> {
        self.attributes.get("AXSubrole").map(String::as_str)
    }

    /// Best human-readable text: title, then help, then description, then role description.
    pub fn desc(&self) -> String {
        [
            self.title.as_deref(),
            self.help.as_deref(),
            self.description.as_deref(),
            self.role_description(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Invisible,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Invisible => "invisible",
        }
    }
}

/// LLM-facing projection of one qualifying node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: u32,
    pub role: String,
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subrole: Option<String>,
    /// Window-local, unclipped.
    pub bbox: ScreenRect,
    /// Screen-absolute, unclipped.
    pub bbox_screen: ScreenRect,
    pub visibility: Visibility,
}

impl ElementRecord {
    /// One prompt line: `[3]<AXButton>Save(visible)</AXButton>`.
    pub fn prompt_line(&self) -> String {
        format!(
            "[{}]<{}>{}({})</{}>",
            self.id,
            self.role,
            self.desc,
            self.visibility.as_str(),
            self.role
        )
    }
}

/// Perception snapshot of one application, replaced wholesale each step.
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    pub trees: Vec<AccessibilityNode>,
    pub screenshot: Option<image::RgbaImage>,
    pub annotated: Option<image::RgbaImage>,
    pub elements: Vec<ElementRecord>,
    pub window_offset: WindowOffset,
    pub window_frame: Option<ScreenRect>,
}

impl ContextState {
    pub fn element(&self, id: u32) -> Option<&ElementRecord> {
        self.elements.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desc_prefers_title_then_help() {
        let mut node = AccessibilityNode {
            role: "AXButton".into(),
            help: Some("Saves the file".into()),
            description: Some("save".into()),
            ..Default::default()
        };
        node.attributes.insert("AXRoleDescription".into(), "button".into());
        assert_eq!(node.desc(), "Saves the file");

        node.title = Some(String::new());
        assert_eq!(node.desc(), "Saves the file");

        node.title = Some("Save".into());
        assert_eq!(node.desc(), "Save");

        let bare = AccessibilityNode { role: "AXGroup".into(), ..Default::default() };
        assert_eq!(bare.desc(), "");
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let image = ScreenRect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(ScreenRect::new(100.0, 10.0, 20.0, 20.0).intersection_area(&image), 0.0);
        assert_eq!(ScreenRect::new(-20.0, 10.0, 20.0, 20.0).intersection_area(&image), 0.0);
        assert_eq!(ScreenRect::new(99.0, 49.0, 20.0, 20.0).intersection_area(&image), 1.0);
    }
}
