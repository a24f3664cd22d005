// Grounding: element records (window-local) → absolute screen points.
use crate::executor::input::ScreenPoint;
use crate::perception::types::{ElementRecord, ScreenRect, WindowOffset};

const SELECTION_MARGIN: f64 = 100.0;

/// Centre of the element in screen coordinates: `bbox.origin + bbox.size / 2 + offset`,
/// rounded to whole points and kept inside the absolute rectangle.
pub fn click_point(element: &ElementRecord, offset: WindowOffset) -> ScreenPoint {
    let abs = element.bbox.translate(offset.x, offset.y);
    let (cx, cy) = abs.center();
    ScreenPoint::new(
        snap(cx, abs.x, abs.x + abs.width),
        snap(cy, abs.y, abs.y + abs.height),
    )
}

/// Nearest whole point to `center` within `[lo, hi]`; plain rounding when the
/// span holds no whole point.
fn snap(center: f64, lo: f64, hi: f64) -> i32 {
    let (min, max) = (lo.ceil(), hi.floor());
    let p = center.round();
    if min <= max {
        p.clamp(min, max) as i32
    } else {
        p as i32
    }
}

/// End point of a partial drag: `start + (target - start) * fraction`, fraction clamped to [0, 1].
pub fn drag_end(start: ScreenPoint, target: ScreenPoint, fraction: f64) -> ScreenPoint {
    let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 1.0 };
    ScreenPoint::new(
        start.x + ((target.x - start.x) as f64 * f) as i32,
        start.y + ((target.y - start.y) as f64 * f) as i32,
    )
}

/// Drag endpoints selecting `region`, given relative to the element's top-left
/// corner, widened by a margin on every side and clipped to the element.
pub fn selection_drag(element: &ScreenRect, region: &ScreenRect) -> (ScreenPoint, ScreenPoint) {
    let left = (element.x + region.x - SELECTION_MARGIN).max(element.x);
    let top = (element.y + region.y - SELECTION_MARGIN).max(element.y);
    let right = (element.x + region.x + region.width + SELECTION_MARGIN).min(element.x + element.width);
    let bottom = (element.y + region.y + region.height + SELECTION_MARGIN).min(element.y + element.height);
    (
        ScreenPoint::new(left.round() as i32, top.round() as i32),
        ScreenPoint::new(right.round() as i32, bottom.round() as i32),
    )
}
