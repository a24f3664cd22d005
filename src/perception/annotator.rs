/// Set-of-Marks annotation: number every qualifying accessibility node and
/// draw its box and ID onto a copy of the window screenshot.
///
/// Record computation is pure and independent of rendering, so the same
/// tree always yields the same IDs regardless of how the marks are drawn.
use crate::perception::bounds::parse_bounds;
use crate::perception::types::{AccessibilityNode, ElementRecord, ScreenRect, Visibility, WindowOffset};

/// Number qualifying nodes in pre-order (parent before children), starting at 1.
///
/// A node qualifies when its frame parses to a non-degenerate rect and, if a
/// whitelist is given, its role is in it. Non-qualifying nodes consume no ID
/// but their children are still visited.
pub fn collect_records(
    trees: &[AccessibilityNode],
    offset: WindowOffset,
    image_size: (u32, u32),
    whitelist: Option<&[&str]>,
) -> Vec<ElementRecord> {
    let viewport = ScreenRect::new(0.0, 0.0, image_size.0 as f64, image_size.1 as f64);
    let mut records = Vec::new();
    let mut counter = 0u32;
    for tree in trees {
        visit(tree, offset, &viewport, whitelist, &mut counter, &mut records);
    }
    records
}

fn visit(
    node: &AccessibilityNode,
    offset: WindowOffset,
    viewport: &ScreenRect,
    whitelist: Option<&[&str]>,
    counter: &mut u32,
    out: &mut Vec<ElementRecord>,
) {
    if let Some(record) = qualify(node, offset, viewport, whitelist, *counter + 1) {
        *counter += 1;
        out.push(record);
    }
    for child in &node.children {
        visit(child, offset, viewport, whitelist, counter, out);
    }
}

fn qualify(
    node: &AccessibilityNode,
    offset: WindowOffset,
    viewport: &ScreenRect,
    whitelist: Option<&[&str]>,
    id: u32,
) -> Option<ElementRecord> {
    if let Some(roles) = whitelist {
        if !roles.iter().any(|r| *r == node.role) {
            return None;
        }
    }
    let frame = node.frame.as_deref()?;
    let bbox_screen = match parse_bounds(frame, None) {
        Ok(rect) => rect,
        Err(e) => {
            tracing::debug!(role = %node.role, error = %e, "skipping node with unparseable frame");
            return None;
        }
    };
    if bbox_screen.is_degenerate() {
        return None;
    }
    let bbox = bbox_screen.translate(-offset.x, -offset.y);
    let visibility = if bbox.intersection_area(viewport) > 0.0 {
        Visibility::Visible
    } else {
        Visibility::Invisible
    };

    Some(ElementRecord {
        id,
        role: node.role.clone(),
        desc: node.desc(),
        role_description: node.role_description().map(str::to_string),
        subrole: node.subrole().map(str::to_string),
        bbox,
        bbox_screen,
        visibility,
    })
}

/// Compute records for `screenshot` and return an annotated copy alongside them.
pub fn annotate(
    screenshot: &image::RgbaImage,
    trees: &[AccessibilityNode],
    offset: WindowOffset,
    whitelist: Option<&[&str]>,
) -> (image::RgbaImage, Vec<ElementRecord>) {
    let records = collect_records(trees, offset, screenshot.dimensions(), whitelist);
    let annotated = draw_marks(screenshot, &records);
    (annotated, records)
}

/// Draw a rectangle and an ID label for each record, clipped to the image.
pub fn draw_marks(screenshot: &image::RgbaImage, records: &[ElementRecord]) -> image::RgbaImage {
    let mut canvas = screenshot.clone();
    let (w, _) = canvas.dimensions();

    // Retina captures are resized to points, but wide windows still get bigger labels.
    let label_scale: u32 = if w > 1600 { 2 } else { 1 };
    let box_thickness: i32 = if w > 1600 { 3 } else { 2 };

    for record in records {
        if record.visibility == Visibility::Invisible {
            continue;
        }
        let col = mark_colour(record.id);
        let x1 = record.bbox.x.round() as i32;
        let y1 = record.bbox.y.round() as i32;
        let x2 = (record.bbox.x + record.bbox.width).round() as i32;
        let y2 = (record.bbox.y + record.bbox.height).round() as i32;

        draw_rect(&mut canvas, x1, y1, x2, y2, col, box_thickness);
        draw_label_bg(&mut canvas, x1, y1, &record.id.to_string(), col, label_scale);
    }
    canvas
}

/// High-visibility colour per ID: every channel stays in 100..=255.
fn mark_colour(id: u32) -> [u8; 4] {
    let h = id.wrapping_mul(2_654_435_761);
    let channel = |shift: u32| 100 + ((h >> shift) % 156) as u8;
    [channel(0), channel(8), channel(16), 255]
}

// ── Drawing primitives ──────────────────────────────────────────────────────

fn draw_rect(
    canvas: &mut image::RgbaImage,
    x1: i32, y1: i32, x2: i32, y2: i32,
    col: [u8; 4],
    thickness: i32,
) {
    let (w, h) = canvas.dimensions();
    let (iw, ih) = (w as i32, h as i32);
    let (cx1, cx2) = (x1.max(0), x2.min(iw - 1));
    let (cy1, cy2) = (y1.max(0), y2.min(ih - 1));
    if cx1 > cx2 || cy1 > cy2 {
        return;
    }

    for t in 0..thickness {
        for (y, x_range) in [(y1 + t, cx1..=cx2), (y2 - t, cx1..=cx2)] {
            if (0..ih).contains(&y) {
                for x in x_range {
                    set_pixel(canvas, x as u32, y as u32, col);
                }
            }
        }
        for x in [x1 + t, x2 - t] {
            if (0..iw).contains(&x) {
                for y in cy1..=cy2 {
                    set_pixel(canvas, x as u32, y as u32, col);
                }
            }
        }
    }
}

/// Filled label box with the ID in dark digits, anchored at the box's top-left.
fn draw_label_bg(
    canvas: &mut image::RgbaImage,
    x: i32, y: i32,
    text: &str,
    col: [u8; 4],
    scale: u32,
) {
    let (w, h) = canvas.dimensions();
    let char_w = 5 * scale + 1;
    let pad = 2 * scale;
    let label_w = text.len() as u32 * char_w + pad * 2;
    let label_h = 5 * scale + pad * 2;

    // Keep the label on the canvas even when the box starts off-screen.
    let lx = x.clamp(0, (w as i32 - label_w as i32).max(0)) as u32;
    let ly = y.clamp(0, (h as i32 - label_h as i32).max(0)) as u32;

    for dy in 0..label_h {
        for dx in 0..label_w {
            let (px, py) = (lx + dx, ly + dy);
            if px < w && py < h {
                canvas.put_pixel(px, py, image::Rgba(col));
            }
        }
    }

    let ink = [0, 0, 0, 255];
    for (i, c) in text.chars().enumerate() {
        let gx = lx + pad + i as u32 * char_w;
        draw_digit(canvas, c, gx, ly + pad, ink, scale);
    }
}

fn draw_digit(canvas: &mut image::RgbaImage, c: char, px: u32, py: u32, col: [u8; 4], scale: u32) {
    let Some(d) = c.to_digit(10) else {
        return;
    };
    let glyph = DIGITS[d as usize];
    let (w, h) = canvas.dimensions();
    for (row, &bits) in glyph.iter().enumerate() {
        for bit in 0..5u32 {
            if (bits >> (4 - bit)) & 1 == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let x = px + bit * scale + sx;
                    let y = py + row as u32 * scale + sy;
                    if x < w && y < h {
                        set_pixel(canvas, x, y, col);
                    }
                }
            }
        }
    }
}

fn set_pixel(canvas: &mut image::RgbaImage, x: u32, y: u32, col: [u8; 4]) {
    let p = canvas.get_pixel_mut(x, y);
    let a = col[3] as f32 / 255.0;
    p[0] = (p[0] as f32 * (1.0 - a) + col[0] as f32 * a).round() as u8;
    p[1] = (p[1] as f32 * (1.0 - a) + col[1] as f32 * a).round() as u8;
    p[2] = (p[2] as f32 * (1.0 - a) + col[2] as f32 * a).round() as u8;
    p[3] = 255;
}

/// 5×5 bitmap digits 0-9.
const DIGITS: [[u8; 5]; 10] = [
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00110, 0b01000, 0b11111],
    [0b11110, 0b00001, 0b00110, 0b00001, 0b11110],
    [0b00110, 0b01010, 0b10010, 0b11111, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b11110],
    [0b01110, 0b10000, 0b11110, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b00100],
    [0b01110, 0b10001, 0b01110, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b01111, 0b00001, 0b01110],
];
