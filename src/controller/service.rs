use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::state::ActionResult;
use crate::apps::ContentReader;
use crate::controller::actions::Action;
use crate::controller::computer_use;
use crate::errors::{MacAgentError, MacAgentResult};
use crate::executor::applescript::{posix_file, quote, ScriptRunner};
use crate::executor::content::{self, CalendarEvent, CONTENT_LIMIT};
use crate::executor::coordinator::{drag_end, selection_drag};
use crate::executor::document::DocumentEditor;
use crate::executor::input::{parse_chord, ClickStyle, InputDriver, Key};
use crate::executor::text_input::{plan_text_entry, TextEntry};
use crate::llm::provider::RoleClient;
use crate::perception::context::AppContext;
use crate::perception::types::ScreenRect;

const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

const SELECT_ALL: &[Key] = &[Key::Command, Key::Char('a')];
const COPY: &[Key] = &[Key::Command, Key::Char('c')];
const PASTE: &[Key] = &[Key::Command, Key::Char('v')];
const SAVE: &[Key] = &[Key::Command, Key::Char('s')];
const CLOSE_WINDOW: &[Key] = &[Key::Command, Key::Char('w')];
const ENTER: &[Key] = &[Key::Enter];

const FRONT_FOLDER: &str = "if (count of Finder windows) = 0 then return \"\"
    return POSIX path of (target of front window as alias)";

const TEXTEDIT_DOCUMENTS: &str = "tell application \"TextEdit\"
    set out to \"\"
    repeat with aDoc in documents
        set out to out & \"== \" & (name of aDoc) & \" ==\" & linefeed & (text of aDoc) & linefeed
    end repeat
    return out
end tell";

/// Executes validated actions against one application.
pub struct Controller {
    input: Arc<dyn InputDriver>,
    scripts: Arc<dyn ScriptRunner>,
    editor: Arc<dyn DocumentEditor>,
    vision: Option<RoleClient>,
    settle: Duration,
}

impl Controller {
    pub fn new(
        input: Arc<dyn InputDriver>,
        scripts: Arc<dyn ScriptRunner>,
        editor: Arc<dyn DocumentEditor>,
        vision: Option<RoleClient>,
    ) -> Self {
        Self {
            input,
            scripts,
            editor,
            vision,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Pause after UI-changing actions so the next perception sees the result.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    pub async fn act(&self, action: Action, ctx: &mut AppContext) -> MacAgentResult<ActionResult> {
        match action {
            Action::Done { text, success } => {
                tracing::info!(success, "agent reported done");
                Ok(ActionResult::done(text, success))
            }

            Action::ClickElement { index } => {
                let style = ctx.profile().clicks.style_for(&ctx.element(index)?.role);
                self.click(ctx, index, style).await?;
                Ok(ActionResult::ok(format!("Clicked element {index}")))
            }

            Action::RightClickElement { index } => {
                self.click(ctx, index, ClickStyle::RightSingle).await?;
                Ok(ActionResult::ok(format!("Right-clicked element {index}")))
            }

            Action::InputText { index, text } => {
                self.click(ctx, index, ClickStyle::LeftSingle).await?;
                let style = ctx.profile().input;
                if style.replace_existing {
                    self.input.key_chord(SELECT_ALL).await?;
                }
                let plan = plan_text_entry(&text);
                match &plan.entry {
                    TextEntry::Typed(body) => self.input.type_text(body).await?,
                    TextEntry::Pasted(body) => {
                        self.input.set_clipboard(body).await?;
                        self.input.key_chord(PASTE).await?;
                    }
                }
                if plan.press_enter || style.submit {
                    self.input.key_chord(ENTER).await?;
                }
                self.settle().await;
                Ok(ActionResult::ok(format!("Input {text:?} into element {index}")))
            }

            Action::Scroll { index, amount } => {
                let at = ctx.click_point(index)?;
                self.input.move_to(at).await?;
                self.input.scroll(amount).await?;
                self.settle().await;
                let direction = if amount >= 0 { "up" } else { "down" };
                Ok(ActionResult::ok(format!(
                    "Scrolled {direction} by {} over element {index}",
                    amount.abs()
                )))
            }

            Action::Drag {
                source_index,
                target_index,
                distance,
            } => {
                let from = ctx.click_point(source_index)?;
                let target = ctx.click_point(target_index)?;
                let to = drag_end(from, target, distance);
                self.input.drag(from, to).await?;
                self.settle().await;
                Ok(ActionResult::ok(format!(
                    "Dragged element {source_index} towards element {target_index} ({:.0}%)",
                    distance.clamp(0.0, 1.0) * 100.0
                )))
            }

            Action::OpenApplication { file_path } => {
                ctx.session().launch(file_path.as_deref()).await?;
                if let Some(path) = &file_path {
                    ctx.document.opened(path.clone());
                }
                self.settle().await;
                let app = ctx.profile().app_name;
                Ok(ActionResult::ok(match &file_path {
                    Some(p) => format!("Opened {} in {app}", p.display()),
                    None => format!("Opened {app}"),
                }))
            }

            Action::Save { file_path } => {
                self.input.key_chord(SAVE).await?;
                self.settle().await;
                self.copy_if_moved(ctx, &file_path).await?;
                Ok(ActionResult::ok(format!("Saved to {}", file_path.display())))
            }

            Action::SaveAndClose { file_path } => {
                match ctx.profile().document {
                    Some(kind) => {
                        self.scripts.run(&kind.save_and_close_script()).await?;
                    }
                    None => {
                        self.input.key_chord(SAVE).await?;
                        self.settle().await;
                        self.input.key_chord(CLOSE_WINDOW).await?;
                    }
                }
                self.settle().await;
                self.copy_if_moved(ctx, &file_path).await?;
                ctx.document.mark_closed(&file_path);
                Ok(ActionResult::ok(format!("Saved {} and closed it", file_path.display())))
            }

            Action::HotKey { keys } => {
                let chord = parse_chord(&keys)?;
                self.input.key_chord(&chord).await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Pressed {keys}")))
            }

            Action::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                Ok(ActionResult::ok(format!("Waited {seconds} seconds")))
            }

            Action::ComputerUse { subgoal } => {
                let Some(vision) = &self.vision else {
                    return Ok(ActionResult::failed("no vision model configured for computer_use"));
                };
                let result = computer_use::run(&subgoal, ctx.state(), vision, self.input.as_ref()).await?;
                self.settle().await;
                Ok(result)
            }

            Action::EditDocument {
                operation,
                params,
                output_path,
            } => {
                let supported = ctx.profile().document.is_some_and(|k| k.supports_edits());
                if !supported {
                    return Err(MacAgentError::Validation(format!(
                        "{} documents cannot be edited on disk",
                        ctx.profile().app_name
                    )));
                }
                let document = ctx.document.closed()?;
                let output = output_path.unwrap_or_else(|| document.path().to_path_buf());
                let outcome = self.editor.apply(&document, &output, &operation, &params).await?;
                Ok(if outcome.success {
                    ActionResult::ok(outcome.message)
                } else {
                    ActionResult::failed(outcome.message)
                })
            }

            Action::Paste { index } => {
                self.click(ctx, index, ClickStyle::LeftSingle).await?;
                self.input.key_chord(SELECT_ALL).await?;
                self.input.key_chord(PASTE).await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Pasted clipboard into element {index}")))
            }

            Action::CopyText { index } => {
                self.click(ctx, index, ClickStyle::LeftDouble).await?;
                self.input.key_chord(SELECT_ALL).await?;
                self.input.key_chord(COPY).await?;
                Ok(ActionResult::ok(format!("Copied text of element {index}")))
            }

            Action::SendMessage { index } => {
                self.click(ctx, index, ClickStyle::LeftSingle).await?;
                self.input.key_chord(ENTER).await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Sent message from element {index}")))
            }

            Action::MoveItem { src_path, dst_folder } => {
                self.finder(&format!(
                    "move ({}) to ({})",
                    finder_item(&src_path),
                    finder_item(&dst_folder)
                ))
                .await?;
                Ok(ActionResult::ok(format!(
                    "Moved {} to {}",
                    src_path.display(),
                    dst_folder.display()
                )))
            }

            Action::RenameItem { path, new_name } => {
                self.finder(&format!("set name of ({}) to {}", finder_item(&path), quote(&new_name)))
                    .await?;
                Ok(ActionResult::ok(format!("Renamed {} to {new_name}", path.display())))
            }

            Action::TrashItem { path } => {
                self.finder(&format!("delete ({})", finder_item(&path))).await?;
                Ok(ActionResult::ok(format!("Moved {} to the Trash", path.display())))
            }

            Action::Reveal { path } => {
                self.finder(&format!("reveal ({})\n    activate", finder_item(&path)))
                    .await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Revealed {}", path.display())))
            }

            Action::CopyFinder { file_path } => {
                if !tokio::fs::try_exists(&file_path).await? {
                    return Err(MacAgentError::Validation(format!(
                        "{} does not exist",
                        file_path.display()
                    )));
                }
                self.scripts
                    .run(&format!("set the clipboard to ({})", posix_file(&file_path)))
                    .await?;
                Ok(ActionResult::ok(format!("Copied {} to the clipboard", file_path.display())))
            }

            Action::PasteFinder { path } => {
                self.finder(&format!(
                    "duplicate (the clipboard as «class furl») to ({})",
                    finder_item(&path)
                ))
                .await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Pasted the clipboard item into {}", path.display())))
            }

            Action::ReadContent {} => self.read_content(ctx).await,

            Action::ExtractText { file_path, pages } => {
                let text = content::select_pages(&load_pdf(file_path.clone()).await?, &pages);
                Ok(ActionResult::ok(format!(
                    "Extracted text from {}:\n{text}",
                    file_path.display()
                )))
            }

            Action::SearchKeyword { file_path, keyword } => {
                let found = content::pages_with_keyword(&load_pdf(file_path.clone()).await?, &keyword);
                Ok(ActionResult::ok(if found.is_empty() {
                    format!("Keyword {keyword:?} not found in {}", file_path.display())
                } else {
                    format!("Pages of {} containing {keyword:?}:{found}", file_path.display())
                }))
            }

            Action::SelectImage {
                index,
                x,
                y,
                width,
                height,
            } => {
                let element = ctx.element(index)?.bbox_screen;
                let (from, to) = selection_drag(&element, &ScreenRect::new(x, y, width, height));
                self.input.drag(from, to).await?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Selected a region of element {index}")))
            }

            Action::CreateCalendarEvent {
                summary,
                description,
                date_start,
                date_end,
            } => {
                let event = CalendarEvent::new(&summary, &description, &date_start, &date_end)?;
                let uid = uuid::Uuid::new_v4().to_string();
                let path = std::env::temp_dir().join(format!("macagent-event-{uid}.ics"));
                tokio::fs::write(&path, event.to_ics(&uid, chrono::Utc::now())).await?;
                tracing::info!(path = %path.display(), "calendar event written");
                // A failed open is a failed action, not a failed launch of the agent's app.
                self.scripts
                    .open(ctx.profile().app_name, Some(&path))
                    .await
                    .map_err(|e| MacAgentError::Executor(e.to_string()))?;
                self.settle().await;
                Ok(ActionResult::ok(format!("Created calendar event {summary}")))
            }
        }
    }

    async fn read_content(&self, ctx: &AppContext) -> MacAgentResult<ActionResult> {
        match ctx.profile().reader {
            Some(ContentReader::FinderWindow) => {
                let folder = self.finder(FRONT_FOLDER).await?;
                if folder.is_empty() {
                    return Ok(ActionResult::failed("No Finder window open"));
                }
                let listing = content::list_folder(Path::new(&folder)).await?;
                Ok(ActionResult::ok(content::truncate(
                    &listing.to_string(),
                    CONTENT_LIMIT,
                    "(Truncated)",
                )))
            }
            Some(ContentReader::TextEditDocuments) => {
                let text = self.scripts.run(TEXTEDIT_DOCUMENTS).await?;
                if text.is_empty() {
                    return Ok(ActionResult::failed("No open TextEdit documents"));
                }
                Ok(ActionResult::ok(format!(
                    "Extracted content:\n{}",
                    content::truncate(&text, CONTENT_LIMIT, "(Truncated)")
                )))
            }
            None => Err(MacAgentError::Validation(format!(
                "{} has no readable content",
                ctx.profile().app_name
            ))),
        }
    }

    async fn click(&self, ctx: &AppContext, index: u32, style: ClickStyle) -> MacAgentResult<()> {
        let at = ctx.click_point(index)?;
        tracing::debug!(index, x = at.x, y = at.y, ?style, "clicking element");
        self.input.click(at, style).await?;
        self.settle().await;
        Ok(())
    }

    /// Copy the working document to `target` when the app saved it elsewhere.
    async fn copy_if_moved(&self, ctx: &AppContext, target: &Path) -> MacAgentResult<()> {
        let Some(source) = ctx.document.path() else {
            return Ok(());
        };
        if source == target || !source.exists() {
            return Ok(());
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, target).await?;
        tracing::info!(from = %source.display(), to = %target.display(), "document copied");
        Ok(())
    }

    async fn finder(&self, command: &str) -> MacAgentResult<String> {
        self.scripts
            .run(&format!("tell application \"Finder\"\n    {command}\nend tell"))
            .await
    }
}

fn finder_item(path: &Path) -> String {
    format!("{} as alias", posix_file(path))
}

async fn load_pdf(path: PathBuf) -> MacAgentResult<Vec<String>> {
    tokio::task::spawn_blocking(move || content::pdf_pages(&path))
        .await
        .map_err(|e| MacAgentError::Executor(format!("join: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::profiles;
    use crate::executor::applescript::recording::RecordingScripts;
    use crate::executor::document::NoEditor;
    use crate::executor::input::recording::{InputEvent, RecordingInput};
    use crate::executor::input::ScreenPoint;
    use crate::perception::context::fake::{sample_window, FakeSession};

    struct Rig {
        input: Arc<RecordingInput>,
        scripts: Arc<RecordingScripts>,
        controller: Controller,
    }

    fn rig() -> Rig {
        rig_with(RecordingScripts::default())
    }

    fn rig_with(scripts: RecordingScripts) -> Rig {
        let input = Arc::new(RecordingInput::default());
        let scripts = Arc::new(scripts);
        let controller = Controller::new(input.clone(), scripts.clone(), Arc::new(NoEditor), None)
            .with_settle(Duration::ZERO);
        Rig {
            input,
            scripts,
            controller,
        }
    }

    async fn context(profile: crate::apps::AppProfile) -> AppContext {
        let session = FakeSession::with_trees(profile.app_name, vec![sample_window()]);
        let mut ctx = AppContext::new(Box::new(session), profile, 10);
        ctx.get_state().await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn click_style_comes_from_profile() {
        let rig = rig();
        let mut ctx = context(profiles::calendar()).await;
        // id 1 is the window itself, double-clicked by Calendar's default rule
        rig.controller.act(Action::ClickElement { index: 1 }, &mut ctx).await.unwrap();
        rig.controller.act(Action::ClickElement { index: 2 }, &mut ctx).await.unwrap();
        assert_eq!(
            rig.input.take(),
            vec![
                InputEvent::Click(ScreenPoint::new(300, 350), ClickStyle::LeftDouble),
                InputEvent::Click(ScreenPoint::new(125, 240), ClickStyle::LeftSingle),
            ]
        );
    }

    #[tokio::test]
    async fn wechat_input_replaces_and_submits() {
        let rig = rig();
        let mut ctx = context(profiles::wechat()).await;
        let result = rig
            .controller
            .act(Action::InputText { index: 3, text: "你好".into() }, &mut ctx)
            .await
            .unwrap();
        assert!(result.success);
        let at = ScreenPoint::new(250, 230);
        assert_eq!(
            rig.input.take(),
            vec![
                InputEvent::Click(at, ClickStyle::LeftSingle),
                InputEvent::Chord(SELECT_ALL.to_vec()),
                InputEvent::Clipboard("你好".into()),
                InputEvent::Chord(PASTE.to_vec()),
                InputEvent::Chord(ENTER.to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn short_ascii_is_typed_with_enter_on_newline() {
        let rig = rig();
        let mut ctx = context(profiles::browser()).await;
        rig.controller
            .act(Action::InputText { index: 3, text: "rust\n".into() }, &mut ctx)
            .await
            .unwrap();
        let events = rig.input.take();
        assert_eq!(events[1], InputEvent::Type("rust".into()));
        assert_eq!(events[2], InputEvent::Chord(ENTER.to_vec()));
    }

    #[tokio::test]
    async fn missing_index_is_an_error() {
        let rig = rig();
        let mut ctx = context(profiles::browser()).await;
        let err = rig
            .controller
            .act(Action::ClickElement { index: 99 }, &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Element with index 99 not found"));
        assert!(rig.input.take().is_empty());
    }

    #[tokio::test]
    async fn partial_drag_stops_short() {
        let rig = rig();
        let mut ctx = context(profiles::player()).await;
        rig.controller
            .act(
                Action::Drag {
                    source_index: 2,
                    target_index: 3,
                    distance: 0.5,
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            rig.input.take(),
            vec![InputEvent::Drag(ScreenPoint::new(125, 240), ScreenPoint::new(187, 235))]
        );
    }

    #[tokio::test]
    async fn edit_requires_save_and_close_first() {
        let rig = rig();
        let mut ctx = context(profiles::word()).await;
        let open = Action::OpenApplication {
            file_path: Some(PathBuf::from("/tmp/macagent-report.docx")),
        };
        rig.controller.act(open, &mut ctx).await.unwrap();

        let edit = Action::EditDocument {
            operation: "insert_text".into(),
            params: serde_json::json!({"text": "hi"}),
            output_path: None,
        };
        let err = rig.controller.act(edit.clone(), &mut ctx).await.unwrap_err();
        assert!(matches!(err, MacAgentError::Precondition(_)));

        rig.controller
            .act(
                Action::SaveAndClose {
                    file_path: PathBuf::from("/tmp/macagent-report.docx"),
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(rig.scripts.scripts.lock().unwrap()[0].contains("close active document"));

        // NoEditor reports failure, but the precondition now holds.
        let result = rig.controller.act(edit, &mut ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no document editor configured"));
    }

    #[tokio::test]
    async fn textedit_documents_are_not_editable() {
        let rig = rig();
        let mut ctx = context(profiles::textedit()).await;
        let edit = Action::EditDocument {
            operation: "insert_text".into(),
            params: serde_json::Value::Null,
            output_path: None,
        };
        assert!(matches!(
            rig.controller.act(edit, &mut ctx).await,
            Err(MacAgentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn save_copies_to_a_new_path() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("draft.txt");
        std::fs::write(&original, "hello").unwrap();
        let target = dir.path().join("out/final.txt");

        let rig = rig();
        let mut ctx = context(profiles::textedit()).await;
        ctx.document.opened(original.clone());
        rig.controller
            .act(Action::SaveAndClose { file_path: target.clone() }, &mut ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert!(rig.scripts.scripts.lock().unwrap()[0].contains("TextEdit"));
        assert_eq!(ctx.document.closed().unwrap().path(), original.as_path());
    }

    #[tokio::test]
    async fn finder_actions_run_scripts() {
        let rig = rig();
        let mut ctx = context(profiles::finder()).await;
        rig.controller
            .act(
                Action::RenameItem {
                    path: PathBuf::from("/Users/me/a.txt"),
                    new_name: "b.txt".into(),
                },
                &mut ctx,
            )
            .await
            .unwrap();
        let scripts = rig.scripts.scripts.lock().unwrap();
        assert_eq!(
            scripts[0],
            "tell application \"Finder\"\n    set name of (POSIX file \"/Users/me/a.txt\" as alias) to \"b.txt\"\nend tell"
        );
    }

    #[tokio::test]
    async fn launch_failure_propagates() {
        let rig = rig();
        let session = FakeSession {
            name: "Preview".into(),
            fail_launch: true,
            ..Default::default()
        };
        let mut ctx = AppContext::new(Box::new(session), profiles::preview(), 10);
        let open = Action::OpenApplication {
            file_path: Some(PathBuf::from("/tmp/scan.pdf")),
        };
        assert!(matches!(
            rig.controller.act(open, &mut ctx).await,
            Err(MacAgentError::AppLaunch(_))
        ));
        assert!(!ctx.document.is_open());
    }

    #[tokio::test]
    async fn bad_hot_key_is_a_validation_error() {
        let rig = rig();
        let mut ctx = context(profiles::player()).await;
        assert!(matches!(
            rig.controller.act(Action::HotKey { keys: "hyper q".into() }, &mut ctx).await,
            Err(MacAgentError::Validation(_))
        ));
        rig.controller
            .act(Action::HotKey { keys: "space".into() }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(rig.input.take(), vec![InputEvent::Chord(vec![Key::Space])]);
    }

    #[tokio::test]
    async fn scroll_moves_then_scrolls() {
        let rig = rig();
        let mut ctx = context(profiles::browser()).await;
        let up = rig
            .controller
            .act(Action::Scroll { index: 3, amount: 3 }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            rig.input.take(),
            vec![InputEvent::Move(ScreenPoint::new(250, 230)), InputEvent::Scroll(3)]
        );
        assert!(up.extracted_content.unwrap().contains("Scrolled up by 3"));

        let down = rig
            .controller
            .act(Action::Scroll { index: 3, amount: -2 }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(rig.input.take()[1], InputEvent::Scroll(-2));
        assert!(down.extracted_content.unwrap().contains("Scrolled down by 2"));
    }

    #[tokio::test]
    async fn save_keeps_the_document_open() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("draft.txt");
        std::fs::write(&original, "hello").unwrap();
        let target = dir.path().join("copy.txt");

        let rig = rig();
        let mut ctx = context(profiles::textedit()).await;
        ctx.document.opened(original.clone());
        rig.controller
            .act(Action::Save { file_path: target.clone() }, &mut ctx)
            .await
            .unwrap();

        assert_eq!(rig.input.take(), vec![InputEvent::Chord(SAVE.to_vec())]);
        assert!(rig.scripts.scripts.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert!(ctx.document.is_open());
    }

    #[tokio::test]
    async fn save_and_close_uses_keys_without_a_document_script() {
        let rig = rig();
        let mut ctx = context(profiles::preview()).await;
        rig.controller
            .act(
                Action::SaveAndClose {
                    file_path: PathBuf::from("/tmp/macagent-scan.pdf"),
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            rig.input.take(),
            vec![InputEvent::Chord(SAVE.to_vec()), InputEvent::Chord(CLOSE_WINDOW.to_vec())]
        );
        assert!(rig.scripts.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wechat_clipboard_and_send_actions() {
        let rig = rig();
        let mut ctx = context(profiles::wechat()).await;
        let field = ScreenPoint::new(250, 230);

        rig.controller.act(Action::Paste { index: 3 }, &mut ctx).await.unwrap();
        assert_eq!(
            rig.input.take(),
            vec![
                InputEvent::Click(field, ClickStyle::LeftSingle),
                InputEvent::Chord(SELECT_ALL.to_vec()),
                InputEvent::Chord(PASTE.to_vec()),
            ]
        );

        rig.controller.act(Action::CopyText { index: 3 }, &mut ctx).await.unwrap();
        assert_eq!(
            rig.input.take(),
            vec![
                InputEvent::Click(field, ClickStyle::LeftDouble),
                InputEvent::Chord(SELECT_ALL.to_vec()),
                InputEvent::Chord(COPY.to_vec()),
            ]
        );

        rig.controller.act(Action::SendMessage { index: 3 }, &mut ctx).await.unwrap();
        assert_eq!(
            rig.input.take(),
            vec![
                InputEvent::Click(field, ClickStyle::LeftSingle),
                InputEvent::Chord(ENTER.to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn finder_move_trash_and_reveal_scripts() {
        let rig = rig();
        let mut ctx = context(profiles::finder()).await;
        let file = PathBuf::from("/Users/me/a.txt");
        let actions = [
            Action::MoveItem {
                src_path: file.clone(),
                dst_folder: PathBuf::from("/Users/me/Archive"),
            },
            Action::TrashItem { path: file.clone() },
            Action::Reveal { path: file },
        ];
        for action in actions {
            rig.controller.act(action, &mut ctx).await.unwrap();
        }
        let scripts = rig.scripts.scripts.lock().unwrap();
        assert_eq!(
            scripts[0],
            "tell application \"Finder\"\n    move (POSIX file \"/Users/me/a.txt\" as alias) to (POSIX file \"/Users/me/Archive\" as alias)\nend tell"
        );
        assert_eq!(
            scripts[1],
            "tell application \"Finder\"\n    delete (POSIX file \"/Users/me/a.txt\" as alias)\nend tell"
        );
        assert_eq!(
            scripts[2],
            "tell application \"Finder\"\n    reveal (POSIX file \"/Users/me/a.txt\" as alias)\n    activate\nend tell"
        );
    }

    #[tokio::test]
    async fn finder_clipboard_copy_and_paste() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, "%PDF").unwrap();

        let rig = rig();
        let mut ctx = context(profiles::finder()).await;
        rig.controller
            .act(Action::CopyFinder { file_path: file.clone() }, &mut ctx)
            .await
            .unwrap();
        rig.controller
            .act(Action::PasteFinder { path: PathBuf::from("/Users/me/Archive") }, &mut ctx)
            .await
            .unwrap();

        let scripts = rig.scripts.scripts.lock().unwrap();
        assert_eq!(scripts[0], format!("set the clipboard to ({})", posix_file(&file)));
        assert_eq!(
            scripts[1],
            "tell application \"Finder\"\n    duplicate (the clipboard as «class furl») to (POSIX file \"/Users/me/Archive\" as alias)\nend tell"
        );
    }

    #[tokio::test]
    async fn copying_a_missing_file_is_rejected() {
        let rig = rig();
        let mut ctx = context(profiles::finder()).await;
        let copy = Action::CopyFinder {
            file_path: PathBuf::from("/nonexistent/macagent/report.pdf"),
        };
        assert!(matches!(
            rig.controller.act(copy, &mut ctx).await,
            Err(MacAgentError::Validation(_))
        ));
        assert!(rig.scripts.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn finder_reads_the_front_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("Photos")).unwrap();

        let rig = rig_with(RecordingScripts {
            reply: dir.path().display().to_string(),
            ..Default::default()
        });
        let mut ctx = context(profiles::finder()).await;
        let result = rig.controller.act(Action::ReadContent {}, &mut ctx).await.unwrap();

        let text = result.extracted_content.unwrap();
        assert!(text.starts_with("Current Finder path: "));
        assert!(text.ends_with("Files: notes.txt\nFolders: Photos"));
        assert!(rig.scripts.scripts.lock().unwrap()[0].contains("target of front window"));
    }

    #[tokio::test]
    async fn finder_without_windows_reads_nothing() {
        let rig = rig();
        let mut ctx = context(profiles::finder()).await;
        let result = rig.controller.act(Action::ReadContent {}, &mut ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No Finder window open"));
    }

    #[tokio::test]
    async fn textedit_reads_open_documents() {
        let rig = rig_with(RecordingScripts {
            reply: "== notes.txt ==\nbuy milk\n".into(),
            ..Default::default()
        });
        let mut ctx = context(profiles::textedit()).await;
        let result = rig.controller.act(Action::ReadContent {}, &mut ctx).await.unwrap();
        assert_eq!(
            result.extracted_content.unwrap(),
            "Extracted content:\n== notes.txt ==\nbuy milk\n"
        );
    }

    #[tokio::test]
    async fn apps_without_a_reader_reject_read_content() {
        let rig = rig();
        let mut ctx = context(profiles::preview()).await;
        assert!(matches!(
            rig.controller.act(Action::ReadContent {}, &mut ctx).await,
            Err(MacAgentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn pdf_actions_fail_on_missing_files() {
        let rig = rig();
        let mut ctx = context(profiles::preview()).await;
        let extract = Action::ExtractText {
            file_path: PathBuf::from("/nonexistent/macagent.pdf"),
            pages: vec![0],
        };
        assert!(rig.controller.act(extract, &mut ctx).await.is_err());
        let search = Action::SearchKeyword {
            file_path: PathBuf::from("/nonexistent/macagent.pdf"),
            keyword: "revenue".into(),
        };
        assert!(rig.controller.act(search, &mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn image_selection_drags_a_widened_region() {
        let rig = rig();
        let mut ctx = context(profiles::preview()).await;
        rig.controller
            .act(
                Action::SelectImage {
                    index: 1,
                    x: 150.0,
                    y: 50.0,
                    width: 50.0,
                    height: 40.0,
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            rig.input.take(),
            vec![InputEvent::Drag(ScreenPoint::new(150, 200), ScreenPoint::new(400, 390))]
        );
    }

    #[tokio::test]
    async fn calendar_events_are_opened_as_ics() {
        let rig = rig();
        let mut ctx = context(profiles::calendar()).await;
        let result = rig
            .controller
            .act(
                Action::CreateCalendarEvent {
                    summary: "Design review".into(),
                    description: "Room 4".into(),
                    date_start: "2025-03-22T09:00:00".into(),
                    date_end: "2025-03-22T10:00:00".into(),
                },
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(result.success);

        let opened = rig.scripts.opened.lock().unwrap();
        let (app, path) = &opened[0];
        assert_eq!(app, "Calendar");
        let path = path.clone().unwrap();
        let ics = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(ics.contains("\r\nSUMMARY:Design review\r\n"));
        assert!(ics.contains("\r\nDTSTART:20250322T090000\r\n"));
    }

    #[tokio::test]
    async fn calendar_open_failure_is_not_a_launch_failure() {
        let rig = rig_with(RecordingScripts {
            fail_open: true,
            ..Default::default()
        });
        let mut ctx = context(profiles::calendar()).await;
        let create = Action::CreateCalendarEvent {
            summary: "x".into(),
            description: String::new(),
            date_start: "2025-03-22".into(),
            date_end: "2025-03-22".into(),
        };
        assert!(matches!(
            rig.controller.act(create, &mut ctx).await,
            Err(MacAgentError::Executor(_))
        ));
    }
}
