use super::{AppProfile, ClickTable, ContentReader, DocumentKind, InputStyle};
use crate::executor::input::ClickStyle;

/// Roles worth numbering in Office apps; everything else is layout noise.
const OFFICE_WHITELIST: &[&str] = &[
    "AXCell",
    "AXMenuButton",
    "AXScrollBar",
    "AXLayoutArea",
    "AXButton",
    "AXRadioButton",
    "AXValueIndicator",
    "AXCheckBox",
    "AXComboBox",
];

const OFFICE_CLICKS: ClickTable = ClickTable {
    rules: &[("AXLayoutArea", ClickStyle::LeftDouble)],
    default: ClickStyle::LeftSingle,
};

const MEDIA_CLICKS: ClickTable = ClickTable {
    rules: &[
        ("AXList", ClickStyle::RightSingle),
        ("AXButton", ClickStyle::LeftSingle),
        ("AXRadioButton", ClickStyle::LeftSingle),
    ],
    default: ClickStyle::LeftDouble,
};

const OFFICE_ACTIONS: &[&str] = &["edit_document"];

pub fn browser() -> AppProfile {
    AppProfile {
        agent_name: "browser_agent",
        app_name: "Safari",
        description: "Operates Safari to search the web, open pages and read their content.",
        guidance: "Use input_text on the address bar with a trailing newline to navigate.",
        leaf_roles: &["AXImage"],
        role_whitelist: None,
        clicks: ClickTable::SINGLE,
        input: InputStyle::default(),
        document: None,
        reader: None,
        extra_actions: &[],
    }
}

pub fn calendar() -> AppProfile {
    AppProfile {
        agent_name: "calendar_agent",
        app_name: "Calendar",
        description: "Operates the macOS Calendar app: view dates, create, edit and delete events.",
        guidance: "Double-click a day cell to create an event there, or use create_calendar_event when the title and times are known.",
        leaf_roles: &[],
        role_whitelist: None,
        clicks: ClickTable {
            rules: &[
                ("AXList", ClickStyle::RightSingle),
                ("AXButton", ClickStyle::LeftSingle),
            ],
            default: ClickStyle::LeftDouble,
        },
        input: InputStyle::default(),
        document: None,
        reader: None,
        extra_actions: &["create_calendar_event"],
    }
}

pub fn finder() -> AppProfile {
    AppProfile {
        agent_name: "finder_agent",
        app_name: "Finder",
        description: "Operates Finder: open folders, list, move, rename, copy and trash files and folders.",
        guidance: "Prefer move_item, rename_item and trash_item over dragging in the UI. Use reveal to bring a path into view, read_content to list the open folder, copy_finder then paste_finder to duplicate an item into another folder.",
        leaf_roles: &["AXImage"],
        role_whitelist: None,
        clicks: ClickTable::SINGLE,
        input: InputStyle::default(),
        document: None,
        reader: Some(ContentReader::FinderWindow),
        extra_actions: &[
            "move_item",
            "rename_item",
            "trash_item",
            "reveal",
            "copy_finder",
            "paste_finder",
            "read_content",
        ],
    }
}

pub fn word() -> AppProfile {
    AppProfile {
        agent_name: "word_agent",
        app_name: "Microsoft Word",
        description: "Operates Microsoft Word documents: open, save, close, edit text, insert images and tables, restyle content.",
        guidance: "Call save_and_close before edit_document; edits apply to the file on disk.",
        leaf_roles: &[],
        role_whitelist: Some(OFFICE_WHITELIST),
        clicks: OFFICE_CLICKS,
        input: InputStyle::default(),
        document: Some(DocumentKind::Word),
        reader: None,
        extra_actions: OFFICE_ACTIONS,
    }
}

pub fn excel() -> AppProfile {
    AppProfile {
        agent_name: "excel_agent",
        app_name: "Microsoft Excel",
        description: "Operates Microsoft Excel workbooks: open, save, close, fill cells, restyle ranges.",
        guidance: "Call save_and_close before edit_document; edits apply to the file on disk.",
        leaf_roles: &[],
        role_whitelist: Some(OFFICE_WHITELIST),
        clicks: OFFICE_CLICKS,
        input: InputStyle::default(),
        document: Some(DocumentKind::Excel),
        reader: None,
        extra_actions: OFFICE_ACTIONS,
    }
}

pub fn powerpoint() -> AppProfile {
    AppProfile {
        agent_name: "powerpoint_agent",
        app_name: "Microsoft PowerPoint",
        description: "Operates Microsoft PowerPoint presentations: open, save, close, edit slide text, images and backgrounds.",
        guidance: "Call save_and_close before edit_document; edits apply to the file on disk.",
        leaf_roles: &[],
        role_whitelist: Some(OFFICE_WHITELIST),
        clicks: OFFICE_CLICKS,
        input: InputStyle::default(),
        document: Some(DocumentKind::PowerPoint),
        reader: None,
        extra_actions: OFFICE_ACTIONS,
    }
}

pub fn preview() -> AppProfile {
    AppProfile {
        agent_name: "preview_agent",
        app_name: "Preview",
        description: "Operates Preview to open, read, annotate and export PDFs and images.",
        guidance: "Page thumbnails are not numbered; scroll the document area to move between pages. For PDFs, extract_text and search_keyword read the file directly; select_image selects a region of the page element.",
        leaf_roles: &["AXScrollArea", "AXImage", "AXOutline", "AXList"],
        role_whitelist: None,
        clicks: MEDIA_CLICKS,
        input: InputStyle::default(),
        document: None,
        reader: None,
        extra_actions: &["extract_text", "search_keyword", "select_image"],
    }
}

pub fn textedit() -> AppProfile {
    AppProfile {
        agent_name: "textedit_agent",
        app_name: "TextEdit",
        description: "Operates TextEdit: create, open, write and save plain or rich text files.",
        guidance: "Click the text area before typing. Use read_content to read what the open documents say.",
        leaf_roles: &[],
        role_whitelist: None,
        clicks: ClickTable::SINGLE,
        input: InputStyle::default(),
        document: Some(DocumentKind::TextEdit),
        reader: Some(ContentReader::TextEditDocuments),
        extra_actions: &["read_content"],
    }
}

pub fn wechat() -> AppProfile {
    AppProfile {
        agent_name: "wechat_agent",
        app_name: "WeChat",
        description: "Operates WeChat: search contacts, read chats, copy, paste and send messages.",
        guidance: "Elements marked invisible are scrolled out of view; scroll before clicking them.",
        leaf_roles: &[],
        role_whitelist: None,
        clicks: ClickTable::SINGLE,
        input: InputStyle {
            replace_existing: true,
            submit: true,
        },
        document: None,
        reader: None,
        extra_actions: &["paste", "copy_text", "send_message"],
    }
}

pub fn player() -> AppProfile {
    AppProfile {
        agent_name: "player_agent",
        app_name: "QuickTime Player",
        description: "Operates QuickTime Player: open videos, play, pause, seek and trim.",
        guidance: "Use drag on the playhead with a distance fraction to seek.",
        leaf_roles: &[],
        role_whitelist: None,
        clicks: MEDIA_CLICKS,
        input: InputStyle::default(),
        document: None,
        reader: None,
        extra_actions: &[],
    }
}

/// Every application agent offered to the planner.
pub fn all() -> Vec<AppProfile> {
    vec![
        browser(),
        calendar(),
        excel(),
        finder(),
        powerpoint(),
        preview(),
        textedit(),
        wechat(),
        word(),
        player(),
    ]
}
