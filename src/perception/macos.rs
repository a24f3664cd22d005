/// Accessibility API backend: `AXUIElementRef` as a [`UiElement`] and the
/// live [`AppSession`] for one running application.
use std::path::Path;
use std::sync::Arc;

use accessibility_sys::{
    kAXErrorSuccess, AXError, AXUIElementCopyActionNames, AXUIElementCopyAttributeNames,
    AXUIElementCopyAttributeValue, AXUIElementCreateApplication, AXUIElementRef,
};
use async_trait::async_trait;
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFCopyDescription, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;

use crate::errors::{MacAgentError, MacAgentResult};
use crate::executor::applescript::{activate_script, pid_script, ScriptRunner};
use crate::perception::context::AppSession;
use crate::perception::screenshot::capture_rect;
use crate::perception::tree::{extract_tree, TreeOptions, UiElement, ROLE_ATTRIBUTE, TITLE_ATTRIBUTE};
use crate::perception::types::{AccessibilityNode, ScreenRect};

const WINDOWS_ATTRIBUTE: &str = "AXWindows";
const CHILDREN_ATTRIBUTE: &str = "AXChildren";
const FOCUSED_ATTRIBUTE: &str = "AXFocused";
const PRESS_ACTION: &str = "AXPress";

fn ax_error(what: &str, code: AXError) -> MacAgentError {
    MacAgentError::Perception(format!("{what} failed with AXError {code}"))
}

/// Retained handle to one accessibility element. Dropping releases it.
pub struct AxElement {
    inner: CFType,
}

impl AxElement {
    pub fn application(pid: i32) -> MacAgentResult<Self> {
        let raw = unsafe { AXUIElementCreateApplication(pid) };
        if raw.is_null() {
            return Err(MacAgentError::Perception(format!("no accessibility element for pid {pid}")));
        }
        Ok(Self {
            inner: unsafe { CFType::wrap_under_create_rule(raw as CFTypeRef) },
        })
    }

    fn raw(&self) -> AXUIElementRef {
        self.inner.as_CFTypeRef() as AXUIElementRef
    }

    fn copy_value(&self, attribute: &str) -> MacAgentResult<CFType> {
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = std::ptr::null();
        let code = unsafe {
            AXUIElementCopyAttributeValue(self.raw(), name.as_concrete_TypeRef(), &mut value)
        };
        if code != kAXErrorSuccess || value.is_null() {
            return Err(ax_error(attribute, code));
        }
        Ok(unsafe { CFType::wrap_under_create_rule(value) })
    }

    fn copy_names(&self, actions: bool) -> MacAgentResult<Vec<String>> {
        let mut names: CFArrayRef = std::ptr::null();
        let code = unsafe {
            if actions {
                AXUIElementCopyActionNames(self.raw(), &mut names)
            } else {
                AXUIElementCopyAttributeNames(self.raw(), &mut names)
            }
        };
        if code != kAXErrorSuccess || names.is_null() {
            return Err(ax_error(if actions { "action names" } else { "attribute names" }, code));
        }
        let array: CFArray<CFString> = unsafe { CFArray::wrap_under_create_rule(names) };
        Ok(array.iter().map(|s| s.to_string()).collect())
    }

    fn elements(&self, attribute: &str) -> MacAgentResult<Vec<AxElement>> {
        let value = self.copy_value(attribute)?;
        let array_ref = value.as_CFTypeRef() as CFArrayRef;
        let array: CFArray<CFType> = unsafe { CFArray::wrap_under_get_rule(array_ref) };
        Ok(array.iter().map(|item| AxElement { inner: item.clone() }).collect())
    }

    pub fn windows(&self) -> MacAgentResult<Vec<AxElement>> {
        self.elements(WINDOWS_ATTRIBUTE)
    }
}

/// Strings are read directly, everything else through `CFCopyDescription`.
fn stringify(value: &CFType) -> String {
    if let Some(s) = value.downcast::<CFString>() {
        return s.to_string();
    }
    let description = unsafe { CFCopyDescription(value.as_CFTypeRef()) };
    if description.is_null() {
        return String::new();
    }
    unsafe { CFString::wrap_under_create_rule(description) }.to_string()
}

impl UiElement for AxElement {
    fn role(&self) -> MacAgentResult<Option<String>> {
        Ok(Some(stringify(&self.copy_value(ROLE_ATTRIBUTE)?)))
    }

    fn title(&self) -> Option<String> {
        self.copy_value(TITLE_ATTRIBUTE).ok().map(|v| stringify(&v))
    }

    fn attribute_names(&self) -> MacAgentResult<Vec<String>> {
        self.copy_names(false)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        if name == CHILDREN_ATTRIBUTE || name == WINDOWS_ATTRIBUTE {
            return None;
        }
        self.copy_value(name).ok().map(|v| stringify(&v))
    }

    fn can_press(&self) -> bool {
        self.copy_names(true)
            .map(|actions| actions.iter().any(|a| a == PRESS_ACTION))
            .unwrap_or(false)
    }

    fn is_focused(&self) -> bool {
        self.copy_value(FOCUSED_ATTRIBUTE)
            .ok()
            .and_then(|v| v.downcast::<CFBoolean>())
            .map(bool::from)
            .unwrap_or(false)
    }

    fn children(&self) -> MacAgentResult<Vec<Self>> {
        self.elements(CHILDREN_ATTRIBUTE)
    }
}

/// A running application addressed by name; the pid is looked up on demand
/// so relaunches are picked up.
pub struct AxAppSession {
    app_name: String,
    scripts: Arc<dyn ScriptRunner>,
}

impl AxAppSession {
    pub fn new(app_name: impl Into<String>, scripts: Arc<dyn ScriptRunner>) -> Self {
        Self {
            app_name: app_name.into(),
            scripts,
        }
    }

    async fn pid(&self) -> MacAgentResult<i32> {
        let out = self.scripts.run(&pid_script(&self.app_name)).await?;
        out.trim()
            .parse()
            .map_err(|_| MacAgentError::Perception(format!("{} is not running ({out:?})", self.app_name)))
    }
}

#[async_trait]
impl AppSession for AxAppSession {
    async fn launch(&self, file: Option<&Path>) -> MacAgentResult<()> {
        self.scripts.open(&self.app_name, file).await?;
        self.scripts.run(&activate_script(&self.app_name)).await?;
        Ok(())
    }

    async fn window_trees(&self, opts: &TreeOptions) -> MacAgentResult<Vec<AccessibilityNode>> {
        let pid = self.pid().await?;
        let opts = opts.clone();
        // AXUIElementRef is not Send; the whole traversal stays on one blocking thread.
        tokio::task::spawn_blocking(move || {
            let app = AxElement::application(pid)?;
            let windows = app.windows()?;
            tracing::debug!(pid, windows = windows.len(), "walking accessibility tree");
            Ok(windows.iter().filter_map(|w| extract_tree(w, &opts)).collect())
        })
        .await
        .map_err(|e| MacAgentError::Perception(format!("join: {e}")))?
    }

    async fn capture(&self, rect: &ScreenRect) -> Option<image::RgbaImage> {
        capture_rect(rect).await
    }
}
