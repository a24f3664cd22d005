/// Accessibility tree extraction over an abstract UI element handle.
///
/// The macOS backend implements [`UiElement`] on top of `AXUIElementRef`;
/// tests implement it on plain structs.
use std::collections::{BTreeMap, HashSet};

use crate::errors::MacAgentResult;
use crate::perception::types::{AccessibilityNode, INTERACTIVE_ROLES};

pub const ROLE_ATTRIBUTE: &str = "AXRole";
pub const TITLE_ATTRIBUTE: &str = "AXTitle";
pub const FRAME_ATTRIBUTE: &str = "AXFrame";
pub const DESCRIPTION_ATTRIBUTE: &str = "AXDescription";
pub const HELP_ATTRIBUTE: &str = "AXHelp";

/// Live handle to one native UI element.
pub trait UiElement: Sized {
    fn role(&self) -> MacAgentResult<Option<String>>;

    fn title(&self) -> Option<String>;

    fn attribute_names(&self) -> MacAgentResult<Vec<String>>;

    /// Stringified attribute value, `None` when it cannot be read.
    fn attribute(&self, name: &str) -> Option<String>;

    fn can_press(&self) -> bool;

    fn is_focused(&self) -> bool;

    fn children(&self) -> MacAgentResult<Vec<Self>>;
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub max_depth: usize,
    /// Roles whose subtree is not descended into.
    pub leaf_roles: HashSet<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            leaf_roles: HashSet::new(),
        }
    }
}

impl TreeOptions {
    pub fn with_leaf_roles<I, S>(max_depth: usize, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            max_depth,
            leaf_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn extract_tree<E: UiElement>(element: &E, opts: &TreeOptions) -> Option<AccessibilityNode> {
    extract_at(element, 0, opts)
}

fn extract_at<E: UiElement>(element: &E, level: usize, opts: &TreeOptions) -> Option<AccessibilityNode> {
    if level >= opts.max_depth {
        return None;
    }

    let role = match element.role() {
        Ok(role) => role.unwrap_or_default(),
        Err(e) => {
            tracing::debug!(level, error = %e, "role unreadable, skipping element");
            return None;
        }
    };
    let title = element.title();
    let is_interactive =
        INTERACTIVE_ROLES.contains(&role.as_str()) || element.can_press() || element.is_focused();

    let mut attributes = BTreeMap::new();
    match element.attribute_names() {
        Ok(names) => {
            for name in names {
                if name == ROLE_ATTRIBUTE || name == TITLE_ATTRIBUTE {
                    continue;
                }
                if let Some(value) = element.attribute(&name) {
                    attributes.insert(name, value);
                }
            }
        }
        Err(e) => {
            tracing::debug!(role = %role, error = %e, "attribute names unreadable");
            return Some(leaf(role, title, is_interactive, attributes));
        }
    }

    let mut node = leaf(role, title, is_interactive, attributes);
    if opts.leaf_roles.contains(&node.role) {
        return Some(node);
    }

    match element.children() {
        Ok(children) => {
            node.children = children
                .iter()
                .filter_map(|child| extract_at(child, level + 1, opts))
                .collect();
        }
        Err(e) => {
            tracing::debug!(role = %node.role, error = %e, "children unreadable");
        }
    }
    Some(node)
}

fn leaf(
    role: String,
    title: Option<String>,
    is_interactive: bool,
    attributes: BTreeMap<String, String>,
) -> AccessibilityNode {
    AccessibilityNode {
        frame: attributes.get(FRAME_ATTRIBUTE).cloned(),
        description: attributes.get(DESCRIPTION_ATTRIBUTE).cloned(),
        help: attributes.get(HELP_ATTRIBUTE).cloned(),
        role,
        title,
        is_interactive,
        attributes,
        children: Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeElement;
    use super::*;

    #[test]
    fn scroll_area_is_pruned_to_leaf() {
        let root = FakeElement::new("AXWindow").child(
            FakeElement::new("AXScrollArea")
                .frame(0.0, 0.0, 100.0, 100.0)
                .child(FakeElement::new("AXImage").child(FakeElement::new("AXStaticText"))),
        );
        let opts = TreeOptions::with_leaf_roles(10, ["AXScrollArea"]);

        let tree = extract_tree(&root, &opts).unwrap();
        let scroll = &tree.children[0];
        assert_eq!(scroll.role, "AXScrollArea");
        assert!(scroll.children.is_empty());
        assert!(scroll.frame.is_some());

        let unpruned = extract_tree(&root, &TreeOptions::default()).unwrap();
        assert_eq!(unpruned.children[0].children.len(), 1);
    }

    #[test]
    fn depth_is_bounded() {
        let mut element = FakeElement::new("AXGroup");
        for _ in 0..20 {
            element = FakeElement::new("AXGroup").child(element);
        }
        let tree = extract_tree(&element, &TreeOptions::with_leaf_roles(3, Vec::<String>::new())).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].children.len(), 1);
        assert!(tree.children[0].children[0].children.is_empty());

        assert!(extract_tree(&element, &TreeOptions::with_leaf_roles(0, Vec::<String>::new())).is_none());
    }

    #[test]
    fn broken_node_keeps_siblings() {
        let mut broken = FakeElement::new("AXGroup").child(FakeElement::new("AXButton"));
        broken.broken_children = true;
        let root = FakeElement::new("AXWindow")
            .child(broken)
            .child(FakeElement::new("AXButton").titled("OK"));

        let tree = extract_tree(&root, &TreeOptions::default()).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children[0].children.is_empty());
        assert_eq!(tree.children[1].title.as_deref(), Some("OK"));
        assert!(tree.children[1].is_interactive);
    }

    #[test]
    fn role_and_title_are_not_duplicated_in_attributes() {
        let root = FakeElement::new("AXStaticText")
            .frame(1.0, 2.0, 3.0, 4.0)
            .titled("Hello");
        let node = extract_tree(&root, &TreeOptions::default()).unwrap();
        assert!(!node.attributes.contains_key(ROLE_ATTRIBUTE));
        assert_eq!(node.frame.as_deref(), Some("x:1 y:2 w:3 h:4"));
        assert!(!node.is_interactive);
    }
}
