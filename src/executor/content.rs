/// Reading documents and folders back as text, and writing calendar files.
///
/// Everything here returns plain text meant for the agent's history, so
/// long results are cut at [`CONTENT_LIMIT`] characters.
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{MacAgentError, MacAgentResult};

pub const CONTENT_LIMIT: usize = 10_000;

/// Cut `text` to `limit` characters and append `note` when it was longer.
pub fn truncate(text: &str, limit: usize, note: &str) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}{note}", &text[..end]),
        None => text.to_string(),
    }
}

/// Text of every page, in page order. Pages whose text cannot be decoded are
/// kept as empty strings so indices stay aligned with the document.
pub fn pdf_pages(path: &Path) -> MacAgentResult<Vec<String>> {
    let doc = lopdf::Document::load(path)?;
    let pages = doc
        .get_pages()
        .into_keys()
        .map(|number| {
            doc.extract_text(&[number]).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), page = number, error = %e, "page text unreadable");
                String::new()
            })
        })
        .collect();
    Ok(pages)
}

/// Concatenated text of the zero-based `wanted` pages, stopping once the
/// limit is passed.
pub fn select_pages(pages: &[String], wanted: &[usize]) -> String {
    let mut text = String::new();
    for (index, page) in pages.iter().enumerate() {
        if !wanted.contains(&index) {
            continue;
        }
        text.push_str(page);
        if text.chars().count() > CONTENT_LIMIT {
            return truncate(&text, CONTENT_LIMIT, &format!("(Truncated at page {index})"));
        }
    }
    text
}

/// Every page containing `keyword`, each prefixed with its zero-based number.
pub fn pages_with_keyword(pages: &[String], keyword: &str) -> String {
    let mut text = String::new();
    for (index, page) in pages.iter().enumerate().filter(|(_, p)| p.contains(keyword)) {
        text.push_str(&format!("\nPage {index} found keyword {keyword}, Content:\n{page}"));
    }
    truncate(&text, CONTENT_LIMIT, "(Truncated)")
}

/// Files and sub-folders of one directory, names sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderListing {
    pub path: PathBuf,
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

impl fmt::Display for FolderListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Current Finder path: {}\nFiles: {}\nFolders: {}",
            self.path.display(),
            self.files.join(", "),
            self.folders.join(", ")
        )
    }
}

/// List `path` the way Finder shows it: dot-files hidden.
pub async fn list_folder(path: &Path) -> MacAgentResult<FolderListing> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut listing = FolderListing {
        path: path.to_path_buf(),
        files: Vec::new(),
        folders: Vec::new(),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            listing.folders.push(name);
        } else {
            listing.files.push(name);
        }
    }
    listing.files.sort();
    listing.folders.sort();
    Ok(listing)
}

/// Accepts `2025-03-22T09:00:00` or a bare date meaning midnight.
pub fn parse_event_time(value: &str) -> MacAgentResult<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            MacAgentError::Validation(format!(
                "unsupported date format: {value}. Expected YYYY-MM-DD or YYYY-MM-DDThh:mm:ss"
            ))
        })
}

/// One event in local (floating) time.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CalendarEvent {
    pub fn new(summary: &str, description: &str, start: &str, end: &str) -> MacAgentResult<Self> {
        let start = parse_event_time(start)?;
        let end = parse_event_time(end)?;
        if end < start {
            return Err(MacAgentError::Validation(format!(
                "event ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self {
            summary: summary.to_string(),
            description: description.to_string(),
            start,
            end,
        })
    }

    /// RFC 5545 calendar holding this event.
    pub fn to_ics(&self, uid: &str, stamp: DateTime<Utc>) -> String {
        const LOCAL: &str = "%Y%m%dT%H%M%S";
        let lines = [
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            "PRODID:-//macagent//calendar//EN".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{uid}"),
            format!("DTSTAMP:{}", stamp.format("%Y%m%dT%H%M%SZ")),
            format!("DTSTART:{}", self.start.format(LOCAL)),
            format!("DTEND:{}", self.end.format(LOCAL)),
            format!("SUMMARY:{}", ics_text(&self.summary)),
            format!("DESCRIPTION:{}", ics_text(&self.description)),
            "END:VEVENT".to_string(),
            "END:VCALENDAR".to_string(),
        ];
        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        out
    }
}

fn ics_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pages() -> Vec<String> {
        vec![
            "Cover page".to_string(),
            "Revenue grew in Q3".to_string(),
            "Appendix: revenue tables".to_string(),
        ]
    }

    #[test]
    fn selected_pages_are_zero_based() {
        assert_eq!(select_pages(&pages(), &[0, 2]), "Cover pageAppendix: revenue tables");
        assert_eq!(select_pages(&pages(), &[7]), "");
    }

    #[test]
    fn long_selections_note_the_page() {
        let big = vec!["a".repeat(CONTENT_LIMIT - 5), "b".repeat(20), "c".repeat(20)];
        let text = select_pages(&big, &[0, 1, 2]);
        assert!(text.ends_with("(Truncated at page 1)"));
        assert!(!text.contains("ccc"));
    }

    #[test]
    fn keyword_search_reports_matching_pages() {
        let text = pages_with_keyword(&pages(), "revenue");
        assert_eq!(text, "\nPage 2 found keyword revenue, Content:\nAppendix: revenue tables");
        assert_eq!(pages_with_keyword(&pages(), "missing"), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("日本語テキスト", 3, "…"), "日本語…");
        assert_eq!(truncate("short", 10, "(Truncated)"), "short");
    }

    #[test]
    fn missing_pdf_is_an_error() {
        assert!(pdf_pages(Path::new("/nonexistent/macagent.pdf")).is_err());
    }

    #[tokio::test]
    async fn folder_listing_hides_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.pdf"), "").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "").unwrap();
        std::fs::create_dir(dir.path().join("Photos")).unwrap();

        let listing = list_folder(dir.path()).await.unwrap();
        assert_eq!(listing.files, vec!["a.pdf", "b.txt"]);
        assert_eq!(listing.folders, vec!["Photos"]);
        assert!(listing.to_string().ends_with("Files: a.pdf, b.txt\nFolders: Photos"));
    }

    #[test]
    fn event_times_accept_dates_and_datetimes() {
        let midnight = parse_event_time("2025-03-22").unwrap();
        assert_eq!(midnight.to_string(), "2025-03-22 00:00:00");
        let nine = parse_event_time("2025-03-22T09:00:00").unwrap();
        assert_eq!(nine.to_string(), "2025-03-22 09:00:00");
        assert!(matches!(parse_event_time("22/03/2025"), Err(MacAgentError::Validation(_))));
    }

    #[test]
    fn events_must_not_end_before_they_start() {
        let err = CalendarEvent::new("x", "", "2025-03-22T10:00:00", "2025-03-22T09:00:00").unwrap_err();
        assert!(matches!(err, MacAgentError::Validation(_)));
    }

    #[test]
    fn ics_escapes_text_fields() {
        let event = CalendarEvent::new(
            "Sync; planning, Q2",
            "line one\nline two",
            "2025-03-22T09:00:00",
            "2025-03-22T10:30:00",
        )
        .unwrap();
        let stamp = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let ics = event.to_ics("evt-1", stamp);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("\r\nDTSTAMP:20250301T120000Z\r\n"));
        assert!(ics.contains("\r\nDTSTART:20250322T090000\r\n"));
        assert!(ics.contains("\r\nDTEND:20250322T103000\r\n"));
        assert!(ics.contains("\r\nSUMMARY:Sync\\; planning\\, Q2\r\n"));
        assert!(ics.contains("\r\nDESCRIPTION:line one\\nline two\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }
}
