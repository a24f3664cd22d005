// Text entry planning. Non-ASCII (CJK, emoji, accents) and long text go via
// clipboard + Cmd+V; short ASCII is typed key by key.

/// Above this many characters typing becomes slow enough to prefer pasting.
const PASTE_THRESHOLD: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEntry {
    Typed(String),
    Pasted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPlan {
    pub entry: TextEntry,
    /// A trailing newline in the requested text means "press Enter afterwards".
    pub press_enter: bool,
}

/// Returns true if the text contains CJK (Chinese/Japanese/Korean) characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c)
        || ('\u{3040}'..='\u{309f}').contains(&c)
        || ('\u{30a0}'..='\u{30ff}').contains(&c)
        || ('\u{ac00}'..='\u{d7af}').contains(&c))
}

pub fn plan_text_entry(text: &str) -> TextPlan {
    let (body, press_enter) = match text.strip_suffix('\n') {
        Some(stripped) => (stripped.strip_suffix('\r').unwrap_or(stripped), true),
        None => (text, false),
    };
    let paste = contains_cjk(body) || !body.is_ascii() || body.chars().count() > PASTE_THRESHOLD;
    let entry = if paste {
        TextEntry::Pasted(body.to_string())
    } else {
        TextEntry::Typed(body.to_string())
    };
    TextPlan { entry, press_enter }
}
