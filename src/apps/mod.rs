/// Per-application configuration: which native app an agent drives, how its
/// accessibility tree is pruned and annotated, and how clicks map to roles.
pub mod profiles;

use crate::executor::applescript::quote;
use crate::executor::input::ClickStyle;

/// Role → click style, first match wins.
#[derive(Debug, Clone, Copy)]
pub struct ClickTable {
    pub rules: &'static [(&'static str, ClickStyle)],
    pub default: ClickStyle,
}

impl ClickTable {
    pub const SINGLE: ClickTable = ClickTable {
        rules: &[],
        default: ClickStyle::LeftSingle,
    };

    pub fn style_for(&self, role: &str) -> ClickStyle {
        self.rules
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, s)| *s)
            .unwrap_or(self.default)
    }
}

/// Applications whose documents are saved and closed by script. All of them
/// except TextEdit can then be edited on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Word,
    Excel,
    PowerPoint,
    TextEdit,
}

impl DocumentKind {
    pub fn save_and_close_script(&self) -> String {
        let (app, noun) = match self {
            DocumentKind::Word => ("Microsoft Word", "active document"),
            DocumentKind::Excel => ("Microsoft Excel", "active workbook"),
            DocumentKind::PowerPoint => ("Microsoft PowerPoint", "active presentation"),
            DocumentKind::TextEdit => {
                return format!(
                    "tell application {} to close front document saving yes",
                    quote("TextEdit")
                )
            }
        };
        format!(
            "tell application {app}\n    save {noun}\n    close {noun}\nend tell",
            app = quote(app),
            noun = noun
        )
    }

    /// Whether file-level edits through the document editor are offered.
    pub fn supports_edits(&self) -> bool {
        !matches!(self, DocumentKind::TextEdit)
    }
}

/// Where `read_content` gets its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentReader {
    /// Listing of the folder shown in the front Finder window.
    FinderWindow,
    /// Name and text of every open TextEdit document.
    TextEditDocuments,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputStyle {
    /// Select the field's existing content before pasting.
    pub replace_existing: bool,
    /// Press Enter after every input (chat boxes).
    pub submit: bool,
}

#[derive(Debug, Clone)]
pub struct AppProfile {
    /// Tool name the planner sees, e.g. `word_agent`.
    pub agent_name: &'static str,
    /// Process / bundle display name passed to `open -a`.
    pub app_name: &'static str,
    pub description: &'static str,
    /// Extra guidance appended to the agent's system prompt.
    pub guidance: &'static str,
    pub leaf_roles: &'static [&'static str],
    pub role_whitelist: Option<&'static [&'static str]>,
    pub clicks: ClickTable,
    pub input: InputStyle,
    pub document: Option<DocumentKind>,
    pub reader: Option<ContentReader>,
    /// App-specific actions on top of the generic set.
    pub extra_actions: &'static [&'static str],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_table_falls_back_to_default() {
        let table = profiles::calendar().clicks;
        assert_eq!(table.style_for("AXList"), ClickStyle::RightSingle);
        assert_eq!(table.style_for("AXButton"), ClickStyle::LeftSingle);
        assert_eq!(table.style_for("AXStaticText"), ClickStyle::LeftDouble);
        assert_eq!(ClickTable::SINGLE.style_for("AXList"), ClickStyle::LeftSingle);
    }

    #[test]
    fn office_scripts_save_then_close() {
        let script = DocumentKind::Word.save_and_close_script();
        assert_eq!(
            script,
            "tell application \"Microsoft Word\"\n    save active document\n    close active document\nend tell"
        );
        assert!(DocumentKind::Excel.save_and_close_script().contains("close active workbook"));
        assert_eq!(
            DocumentKind::TextEdit.save_and_close_script(),
            "tell application \"TextEdit\" to close front document saving yes"
        );
        assert!(!DocumentKind::TextEdit.supports_edits());
        assert!(!DocumentKind::TextEdit.supports_edits());
    }
}
