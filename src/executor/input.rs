// Physical input simulation. enigo + arboard on macOS; other targets get an
// erroring driver so the crate still builds and tests run everywhere.
use async_trait::async_trait;

use crate::errors::{MacAgentError, MacAgentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStyle {
    LeftSingle,
    LeftDouble,
    RightSingle,
}

/// Highest function key the input backend can press.
const MAX_FUNCTION_KEY: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Command,
    Control,
    Option,
    Shift,
    Enter,
    Tab,
    Escape,
    Delete,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Function(u8),
    Char(char),
}

impl Key {
    /// Accepts the names models tend to emit: `cmd`, `command`, `ctrl`, `opt`, `alt`, `return`...
    pub fn parse(name: &str) -> MacAgentResult<Key> {
        let lower = name.trim().to_lowercase();
        let key = match lower.as_str() {
            "cmd" | "command" | "meta" | "super" => Key::Command,
            "ctrl" | "control" => Key::Control,
            "opt" | "option" | "alt" => Key::Option,
            "shift" => Key::Shift,
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "esc" | "escape" => Key::Escape,
            "delete" | "backspace" | "del" => Key::Delete,
            "space" | "spacebar" => Key::Space,
            "up" | "arrowup" => Key::Up,
            "down" | "arrowdown" => Key::Down,
            "left" | "arrowleft" => Key::Left,
            "right" | "arrowright" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    (Some('f'), Some(_)) => other[1..]
                        .parse::<u8>()
                        .ok()
                        .filter(|n| (1..=MAX_FUNCTION_KEY).contains(n))
                        .map(Key::Function)
                        .ok_or_else(|| MacAgentError::Validation(format!("unknown key '{name}'")))?,
                    _ => return Err(MacAgentError::Validation(format!("unknown key '{name}'"))),
                }
            }
        };
        Ok(key)
    }
}

/// Split a space- or plus-separated chord like `command shift s` or `cmd+v`.
pub fn parse_chord(keys: &str) -> MacAgentResult<Vec<Key>> {
    let chord: Vec<Key> = keys
        .split(|c: char| c.is_whitespace() || c == '+')
        .filter(|s| !s.is_empty())
        .map(Key::parse)
        .collect::<MacAgentResult<_>>()?;
    if chord.is_empty() {
        return Err(MacAgentError::Validation("empty key combination".into()));
    }
    Ok(chord)
}

/// Synthetic mouse, keyboard and clipboard access.
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn click(&self, at: ScreenPoint, style: ClickStyle) -> MacAgentResult<()>;

    async fn move_to(&self, at: ScreenPoint) -> MacAgentResult<()>;

    /// Positive amounts scroll up, negative down.
    async fn scroll(&self, amount: i32) -> MacAgentResult<()>;

    async fn drag(&self, from: ScreenPoint, to: ScreenPoint) -> MacAgentResult<()>;

    /// Types characters one by one with a short delay.
    async fn type_text(&self, text: &str) -> MacAgentResult<()>;

    /// Press all keys in order, release in reverse.
    async fn key_chord(&self, keys: &[Key]) -> MacAgentResult<()>;

    async fn set_clipboard(&self, text: &str) -> MacAgentResult<()>;
}

/// The driver for the current platform.
pub fn platform_driver() -> Box<dyn InputDriver> {
    #[cfg(target_os = "macos")]
    {
        Box::new(mac::EnigoDriver)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(UnsupportedDriver)
    }
}

#[cfg(not(target_os = "macos"))]
struct UnsupportedDriver;

#[cfg(not(target_os = "macos"))]
impl UnsupportedDriver {
    fn unsupported<T>() -> MacAgentResult<T> {
        Err(MacAgentError::Executor("synthetic input is only available on macOS".into()))
    }
}

#[cfg(not(target_os = "macos"))]
#[async_trait]
impl InputDriver for UnsupportedDriver {
    async fn click(&self, _at: ScreenPoint, _style: ClickStyle) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn move_to(&self, _at: ScreenPoint) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn scroll(&self, _amount: i32) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn drag(&self, _from: ScreenPoint, _to: ScreenPoint) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn type_text(&self, _text: &str) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn key_chord(&self, _keys: &[Key]) -> MacAgentResult<()> {
        Self::unsupported()
    }
    async fn set_clipboard(&self, _text: &str) -> MacAgentResult<()> {
        Self::unsupported()
    }
}

#[cfg(target_os = "macos")]
mod mac {
    use std::thread::sleep;
    use std::time::Duration;

    use enigo::{Axis, Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

    use super::*;

    const CLICK_INTERVAL: Duration = Duration::from_millis(100);
    const TYPE_INTERVAL: Duration = Duration::from_millis(30);
    const DRAG_STEPS: i32 = 20;

    pub struct EnigoDriver;

    fn err(e: impl std::fmt::Display) -> MacAgentError {
        MacAgentError::Executor(e.to_string())
    }

    /// enigo's macOS backend holds a CGEventSource that is not Send, so every
    /// operation builds its own instance on a blocking thread.
    async fn with_enigo<F>(op: F) -> MacAgentResult<()>
    where
        F: FnOnce(&mut Enigo) -> MacAgentResult<()> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let mut enigo = Enigo::new(&Settings::default()).map_err(err)?;
            op(&mut enigo)
        })
        .await
        .map_err(|e| MacAgentError::Executor(format!("join: {e}")))?
    }

    fn to_enigo(key: Key) -> MacAgentResult<enigo::Key> {
        Ok(match key {
            Key::Command => enigo::Key::Meta,
            Key::Control => enigo::Key::Control,
            Key::Option => enigo::Key::Option,
            Key::Shift => enigo::Key::Shift,
            Key::Enter => enigo::Key::Return,
            Key::Tab => enigo::Key::Tab,
            Key::Escape => enigo::Key::Escape,
            Key::Delete => enigo::Key::Backspace,
            Key::Space => enigo::Key::Space,
            Key::Up => enigo::Key::UpArrow,
            Key::Down => enigo::Key::DownArrow,
            Key::Left => enigo::Key::LeftArrow,
            Key::Right => enigo::Key::RightArrow,
            Key::Home => enigo::Key::Home,
            Key::End => enigo::Key::End,
            Key::PageUp => enigo::Key::PageUp,
            Key::PageDown => enigo::Key::PageDown,
            Key::Function(n) => match n {
                1 => enigo::Key::F1,
                2 => enigo::Key::F2,
                3 => enigo::Key::F3,
                4 => enigo::Key::F4,
                5 => enigo::Key::F5,
                6 => enigo::Key::F6,
                7 => enigo::Key::F7,
                8 => enigo::Key::F8,
                9 => enigo::Key::F9,
                10 => enigo::Key::F10,
                11 => enigo::Key::F11,
                12 => enigo::Key::F12,
                n => return Err(MacAgentError::Validation(format!("unsupported function key f{n}"))),
            },
            Key::Char(c) => enigo::Key::Unicode(c),
        })
    }

    #[async_trait]
    impl InputDriver for EnigoDriver {
        async fn click(&self, at: ScreenPoint, style: ClickStyle) -> MacAgentResult<()> {
            tracing::debug!(x = at.x, y = at.y, ?style, "click");
            with_enigo(move |e| {
                e.move_mouse(at.x, at.y, Coordinate::Abs).map_err(err)?;
                match style {
                    ClickStyle::LeftSingle => e.button(Button::Left, Direction::Click).map_err(err),
                    ClickStyle::RightSingle => e.button(Button::Right, Direction::Click).map_err(err),
                    ClickStyle::LeftDouble => {
                        e.button(Button::Left, Direction::Click).map_err(err)?;
                        sleep(CLICK_INTERVAL);
                        e.button(Button::Left, Direction::Click).map_err(err)
                    }
                }
            })
            .await
        }

        async fn move_to(&self, at: ScreenPoint) -> MacAgentResult<()> {
            with_enigo(move |e| e.move_mouse(at.x, at.y, Coordinate::Abs).map_err(err)).await
        }

        async fn scroll(&self, amount: i32) -> MacAgentResult<()> {
            // enigo scrolls down for positive lengths.
            with_enigo(move |e| e.scroll(-amount, Axis::Vertical).map_err(err)).await
        }

        async fn drag(&self, from: ScreenPoint, to: ScreenPoint) -> MacAgentResult<()> {
            with_enigo(move |e| {
                e.move_mouse(from.x, from.y, Coordinate::Abs).map_err(err)?;
                e.button(Button::Left, Direction::Press).map_err(err)?;
                for step in 1..=DRAG_STEPS {
                    let x = from.x + (to.x - from.x) * step / DRAG_STEPS;
                    let y = from.y + (to.y - from.y) * step / DRAG_STEPS;
                    e.move_mouse(x, y, Coordinate::Abs).map_err(err)?;
                    sleep(Duration::from_millis(50));
                }
                e.button(Button::Left, Direction::Release).map_err(err)
            })
            .await
        }

        async fn type_text(&self, text: &str) -> MacAgentResult<()> {
            let text = text.to_string();
            with_enigo(move |e| {
                let mut buf = [0u8; 4];
                for ch in text.chars() {
                    e.text(ch.encode_utf8(&mut buf)).map_err(err)?;
                    sleep(TYPE_INTERVAL);
                }
                Ok(())
            })
            .await
        }

        async fn key_chord(&self, keys: &[Key]) -> MacAgentResult<()> {
            let keys: Vec<enigo::Key> = keys.iter().copied().map(to_enigo).collect::<MacAgentResult<_>>()?;
            with_enigo(move |e| {
                for k in &keys {
                    e.key(*k, Direction::Press).map_err(err)?;
                }
                for k in keys.iter().rev() {
                    e.key(*k, Direction::Release).map_err(err)?;
                }
                Ok(())
            })
            .await
        }

        async fn set_clipboard(&self, text: &str) -> MacAgentResult<()> {
            let text = text.to_string();
            tokio::task::spawn_blocking(move || {
                let mut clipboard = arboard::Clipboard::new().map_err(err)?;
                clipboard.set_text(text).map_err(err)
            })
            .await
            .map_err(|e| MacAgentError::Executor(format!("join: {e}")))?
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum InputEvent {
        Click(ScreenPoint, ClickStyle),
        Move(ScreenPoint),
        Scroll(i32),
        Drag(ScreenPoint, ScreenPoint),
        Type(String),
        Chord(Vec<Key>),
        Clipboard(String),
    }

    /// Captures every event instead of touching the desktop.
    #[derive(Default)]
    pub struct RecordingInput {
        pub events: Mutex<Vec<InputEvent>>,
    }

    impl RecordingInput {
        pub fn take(&self) -> Vec<InputEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn push(&self, e: InputEvent) -> MacAgentResult<()> {
            self.events.lock().unwrap().push(e);
            Ok(())
        }
    }

    #[async_trait]
    impl InputDriver for RecordingInput {
        async fn click(&self, at: ScreenPoint, style: ClickStyle) -> MacAgentResult<()> {
            self.push(InputEvent::Click(at, style))
        }
        async fn move_to(&self, at: ScreenPoint) -> MacAgentResult<()> {
            self.push(InputEvent::Move(at))
        }
        async fn scroll(&self, amount: i32) -> MacAgentResult<()> {
            self.push(InputEvent::Scroll(amount))
        }
        async fn drag(&self, from: ScreenPoint, to: ScreenPoint) -> MacAgentResult<()> {
            self.push(InputEvent::Drag(from, to))
        }
        async fn type_text(&self, text: &str) -> MacAgentResult<()> {
            self.push(InputEvent::Type(text.to_string()))
        }
        async fn key_chord(&self, keys: &[Key]) -> MacAgentResult<()> {
            self.push(InputEvent::Chord(keys.to_vec()))
        }
        async fn set_clipboard(&self, text: &str) -> MacAgentResult<()> {
            self.push(InputEvent::Clipboard(text.to_string()))
        }
    }
}
