/// Per-run perception context: owns the application session and the latest
/// [`ContextState`] snapshot.
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::apps::AppProfile;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::executor::applescript::ScriptRunner;
use crate::executor::coordinator::click_point;
use crate::executor::document::DocumentSession;
use crate::executor::input::ScreenPoint;
use crate::perception::annotator::{annotate, collect_records};
use crate::perception::bounds::{parse_bounds, window_offset};
use crate::perception::screenshot::largest_window;
use crate::perception::tree::TreeOptions;
use crate::perception::types::{AccessibilityNode, ContextState, ElementRecord, ScreenRect};

/// Live connection to one native application.
#[async_trait]
pub trait AppSession: Send + Sync {
    /// Launch or activate the application, optionally opening `file`.
    async fn launch(&self, file: Option<&Path>) -> MacAgentResult<()>;

    /// One accessibility tree per top-level window.
    async fn window_trees(&self, opts: &TreeOptions) -> MacAgentResult<Vec<AccessibilityNode>>;

    /// Screenshot of a screen-absolute region, scaled to points.
    async fn capture(&self, rect: &ScreenRect) -> Option<image::RgbaImage>;
}

/// The accessibility-backed session for `app_name` on this platform.
pub fn platform_session(app_name: &str, scripts: Arc<dyn ScriptRunner>) -> Box<dyn AppSession> {
    #[cfg(target_os = "macos")]
    {
        Box::new(crate::perception::macos::AxAppSession::new(app_name, scripts))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = scripts;
        Box::new(UnsupportedSession {
            app_name: app_name.to_string(),
        })
    }
}

#[cfg(not(target_os = "macos"))]
struct UnsupportedSession {
    app_name: String,
}

#[cfg(not(target_os = "macos"))]
#[async_trait]
impl AppSession for UnsupportedSession {
    async fn launch(&self, _file: Option<&Path>) -> MacAgentResult<()> {
        Err(MacAgentError::AppLaunch(format!(
            "{}: application control is only available on macOS",
            self.app_name
        )))
    }

    async fn window_trees(&self, _opts: &TreeOptions) -> MacAgentResult<Vec<AccessibilityNode>> {
        Err(MacAgentError::Perception("the accessibility API is only available on macOS".into()))
    }

    async fn capture(&self, _rect: &ScreenRect) -> Option<image::RgbaImage> {
        None
    }
}

pub struct AppContext {
    session: Box<dyn AppSession>,
    profile: AppProfile,
    tree_opts: TreeOptions,
    state: ContextState,
    pub document: DocumentSession,
}

impl AppContext {
    pub fn new(session: Box<dyn AppSession>, profile: AppProfile, max_depth: usize) -> Self {
        let tree_opts = TreeOptions::with_leaf_roles(max_depth, profile.leaf_roles.iter().copied());
        Self {
            session,
            profile,
            tree_opts,
            state: ContextState::default(),
            document: DocumentSession::default(),
        }
    }

    pub fn session(&self) -> &dyn AppSession {
        self.session.as_ref()
    }

    pub fn profile(&self) -> &AppProfile {
        &self.profile
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Re-perceive the application. On failure the state is reset to empty
    /// and the error returned, so a stale snapshot is never acted upon.
    pub async fn get_state(&mut self) -> MacAgentResult<&ContextState> {
        match self.perceive().await {
            Ok(state) => {
                tracing::debug!(
                    app = %self.profile.app_name,
                    elements = state.elements.len(),
                    captured = state.screenshot.is_some(),
                    "state refreshed"
                );
                self.state = state;
            }
            Err(e) => {
                self.state = ContextState::default();
                return Err(e);
            }
        }
        Ok(&self.state)
    }

    async fn perceive(&self) -> MacAgentResult<ContextState> {
        let trees = self.session.window_trees(&self.tree_opts).await?;
        if trees.is_empty() {
            return Ok(ContextState::default());
        }

        let frames: Vec<ScreenRect> = trees
            .iter()
            .map(|t| {
                t.frame
                    .as_deref()
                    .and_then(|f| parse_bounds(f, None).ok())
                    .unwrap_or_default()
            })
            .collect();
        let primary = largest_window(&frames)
            .ok_or_else(|| MacAgentError::Perception("no window with a readable frame".into()))?;
        let frame_desc = trees[primary].frame.as_deref().unwrap_or_default();
        let offset = window_offset(frame_desc)
            .map_err(|e| MacAgentError::Perception(format!("primary window frame: {e}")))?;
        let window_frame = frames[primary];

        let whitelist = self.profile.role_whitelist;
        let screenshot = self.session.capture(&window_frame).await;
        let (annotated, elements) = match &screenshot {
            Some(img) => {
                let (annotated, records) = annotate(img, &trees, offset, whitelist);
                (Some(annotated), records)
            }
            None => {
                tracing::warn!(app = %self.profile.app_name, "no screenshot, annotating from the tree only");
                let size = (
                    window_frame.width.max(0.0) as u32,
                    window_frame.height.max(0.0) as u32,
                );
                (None, collect_records(&trees, offset, size, whitelist))
            }
        };

        Ok(ContextState {
            trees,
            screenshot,
            annotated,
            elements,
            window_offset: offset,
            window_frame: Some(window_frame),
        })
    }

    pub fn element(&self, index: u32) -> MacAgentResult<&ElementRecord> {
        self.state
            .element(index)
            .ok_or_else(|| MacAgentError::Validation(format!("Element with index {index} not found")))
    }

    /// Absolute click point for element `index` in the current state.
    pub fn click_point(&self, index: u32) -> MacAgentResult<ScreenPoint> {
        let element = self.element(index)?;
        Ok(click_point(element, self.state.window_offset))
    }

    /// Element list as shown to the model, one line per record.
    pub fn element_prompt(&self) -> String {
        if self.state.elements.is_empty() {
            return "No interactive elements found, the application may not be open yet.".into();
        }
        self.state
            .elements
            .iter()
            .map(ElementRecord::prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
