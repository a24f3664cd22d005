/// Window-region screenshots.
///
/// The primary path shells out to `screencapture -R`, which respects the
/// Screen Recording permission prompt; `xcap` is the fallback on macOS.
use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::RgbaImage;

use crate::errors::{MacAgentError, MacAgentResult};
use crate::perception::types::ScreenRect;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Index of the window with the largest `width * height`.
pub fn largest_window(frames: &[ScreenRect]) -> Option<usize> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_degenerate())
        .max_by(|(_, a), (_, b)| a.area().total_cmp(&b.area()))
        .map(|(i, _)| i)
}

/// Capture `rect` (screen-absolute points). `None` on any failure.
pub async fn capture_rect(rect: &ScreenRect) -> Option<RgbaImage> {
    if rect.is_degenerate() || rect.width < 0.0 || rect.height < 0.0 {
        tracing::warn!(?rect, "refusing to capture a degenerate rect");
        return None;
    }

    match capture_with_screencapture(rect).await {
        Ok(img) => Some(fit_to_points(img, rect)),
        Err(e) => {
            tracing::warn!(error = %e, "screencapture failed, trying fallback");
            capture_fallback(rect).await.map(|img| fit_to_points(img, rect))
        }
    }
}

async fn capture_with_screencapture(rect: &ScreenRect) -> MacAgentResult<RgbaImage> {
    let file = tempfile::Builder::new()
        .prefix("macagent-shot-")
        .suffix(".png")
        .tempfile()?;
    let region = format!(
        "-R{},{},{},{}",
        rect.x.trunc() as i64,
        rect.y.trunc() as i64,
        rect.width.trunc() as i64,
        rect.height.trunc() as i64
    );

    let output = tokio::time::timeout(
        CAPTURE_TIMEOUT,
        tokio::process::Command::new("screencapture")
            .arg("-x")
            .arg("-o")
            .arg(&region)
            .arg(file.path())
            .output(),
    )
    .await
    .map_err(|_| MacAgentError::Timeout("screencapture".into()))??;

    if !output.status.success() {
        return Err(MacAgentError::Perception(format!(
            "screencapture exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let img = image::open(file.path())?.to_rgba8();
    tracing::debug!(region = %region, width = img.width(), height = img.height(), "window captured");
    Ok(img)
}

pub fn encode_png(img: &RgbaImage) -> MacAgentResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Scale a (possibly Retina) capture down to the window's size in points so
/// window-local coordinates address pixels directly.
pub fn fit_to_points(img: RgbaImage, rect: &ScreenRect) -> RgbaImage {
    let target = (rect.width.round().max(1.0) as u32, rect.height.round().max(1.0) as u32);
    if img.dimensions() == target {
        img
    } else {
        image::imageops::resize(&img, target.0, target.1, FilterType::Triangle)
    }
}

#[cfg(target_os = "macos")]
async fn capture_fallback(rect: &ScreenRect) -> Option<RgbaImage> {
    let rect = *rect;
    tokio::task::spawn_blocking(move || capture_with_xcap(&rect))
        .await
        .ok()
        .flatten()
}

#[cfg(not(target_os = "macos"))]
async fn capture_fallback(_rect: &ScreenRect) -> Option<RgbaImage> {
    None
}

#[cfg(target_os = "macos")]
fn capture_with_xcap(rect: &ScreenRect) -> Option<RgbaImage> {
    let monitors = match xcap::Monitor::all() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "xcap monitor enumeration failed");
            return None;
        }
    };
    let monitor = monitors.into_iter().find(|m| {
        let bounds = ScreenRect::new(m.x() as f64, m.y() as f64, m.width() as f64, m.height() as f64);
        bounds.contains(rect.x, rect.y)
    })?;

    let shot = match monitor.capture_image() {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "xcap capture failed");
            return None;
        }
    };
    let (w, h) = (shot.width(), shot.height());
    let full = RgbaImage::from_raw(w, h, shot.into_raw())?;

    let scale = monitor.scale_factor() as f64;
    let x = ((rect.x - monitor.x() as f64) * scale).max(0.0) as u32;
    let y = ((rect.y - monitor.y() as f64) * scale).max(0.0) as u32;
    let cw = ((rect.width * scale) as u32).min(w.saturating_sub(x));
    let ch = ((rect.height * scale) as u32).min(h.saturating_sub(y));
    if cw == 0 || ch == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(&full, x, y, cw, ch).to_image())
}
