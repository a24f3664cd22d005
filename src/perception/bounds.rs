/// Parsing of native bounds descriptors such as the description of an
/// `AXFrame` value: `<AXValue 0x6000> {value = x:603.5 y:46 w:65 h:25 type = kAXValueCGRectType}`.
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{MacAgentError, MacAgentResult};
use crate::perception::types::{ScreenRect, WindowOffset};

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([xywh]):\s*(-?\d+(?:\.\d+)?)").expect("bounds regex is valid")
    })
}

/// Parse the four labeled fields into a rect. With an offset the result is
/// window-local (`x - offset.x`, `y - offset.y`).
pub fn parse_bounds(descriptor: &str, offset: Option<WindowOffset>) -> MacAgentResult<ScreenRect> {
    let (mut x, mut y, mut w, mut h) = (None, None, None, None);
    for caps in field_regex().captures_iter(descriptor) {
        let value: f64 = caps[2]
            .parse()
            .map_err(|_| MacAgentError::Parse(format!("bad number in '{descriptor}'")))?;
        let slot = match &caps[1] {
            "x" => &mut x,
            "y" => &mut y,
            "w" => &mut w,
            _ => &mut h,
        };
        slot.get_or_insert(value);
    }

    match (x, y, w, h) {
        (Some(x), Some(y), Some(w), Some(h)) => {
            let rect = ScreenRect::new(x, y, w, h);
            Ok(match offset {
                Some(o) => rect.translate(-o.x, -o.y),
                None => rect,
            })
        }
        _ => Err(MacAgentError::Parse(format!(
            "could not locate x/y/w/h in '{descriptor}'"
        ))),
    }
}

pub fn format_bounds(rect: &ScreenRect) -> String {
    format!("x:{} y:{} w:{} h:{}", rect.x, rect.y, rect.width, rect.height)
}

/// Window origin from a frame descriptor, truncated to whole points.
pub fn window_offset(frame: &str) -> MacAgentResult<WindowOffset> {
    let rect = parse_bounds(frame, None)?;
    Ok(WindowOffset {
        x: rect.x.trunc(),
        y: rect.y.trunc(),
    })
}
