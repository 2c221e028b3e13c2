//! Watermark placement: scale to the canvas, rotate, then paste once at an
//! anchor or repeat across the canvas as a staggered tile pattern.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::config::{PlacementConfig, Position, MIN_WATERMARK_SCALE, MIN_WATERMARK_SIDE};
use crate::watermark::WatermarkAsset;

/// Composite `asset` onto a copy of `canvas` according to `config`.
///
/// The watermark is first resized relative to the canvas width and rotated,
/// then placed either at an anchor or as a tiled pattern.
#[must_use]
pub fn apply_watermark(
    canvas: &RgbaImage,
    asset: &WatermarkAsset,
    config: &PlacementConfig,
) -> RgbaImage {
    let scaled = scale_watermark(asset.image(), canvas.width(), config.scale);
    let watermark = rotate_expand(&scaled, config.angle);

    match config.position {
        Position::Tiled => apply_tiled(canvas, &watermark, config.gap),
        anchored => apply_anchored(canvas, &watermark, anchored, config.margin),
    }
}

/// Resize `watermark` so its width is `scale` of `canvas_width`, keeping the
/// aspect ratio.
///
/// `scale` is clamped to `[0.01, 1.0]` and each side is at least
/// [`MIN_WATERMARK_SIDE`] pixels.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scale_watermark(watermark: &RgbaImage, canvas_width: u32, scale: f32) -> RgbaImage {
    let scale = if scale.is_finite() {
        scale.clamp(MIN_WATERMARK_SCALE, 1.0)
    } else {
        1.0
    };
    let (wm_w, wm_h) = watermark.dimensions();

    let target_w = ((f64::from(canvas_width) * f64::from(scale)).floor() as u32)
        .max(MIN_WATERMARK_SIDE);
    let target_h = if wm_w == 0 {
        MIN_WATERMARK_SIDE
    } else {
        ((f64::from(wm_h) * f64::from(target_w) / f64::from(wm_w)).floor() as u32)
            .max(MIN_WATERMARK_SIDE)
    };

    debug!(wm_w, wm_h, target_w, target_h, "scaling watermark");
    imageops::resize(watermark, target_w, target_h, FilterType::Lanczos3)
}

/// Rotate counter-clockwise by `angle` degrees, growing the canvas so no
/// corner is clipped. A zero angle returns a copy.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rotate_expand(image: &RgbaImage, angle: f32) -> RgbaImage {
    if !angle.is_finite() || angle.rem_euclid(360.0) == 0.0 {
        return image.clone();
    }

    let (w, h) = image.dimensions();
    let radians = f64::from(angle).to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    // Trig noise at right angles would otherwise round 100.0000001 up to 101.
    let rot_w = ((f64::from(w) * cos + f64::from(h) * sin - 1e-6).ceil() as u32).max(1);
    let rot_h = ((f64::from(w) * sin + f64::from(h) * cos - 1e-6).ceil() as u32).max(1);

    // Work on a frame that holds both the source and the rotated result, with
    // the source centered so rotating about the frame center keeps it there.
    let mut frame_w = w.max(rot_w);
    let mut frame_h = h.max(rot_h);
    frame_w += (frame_w - w) % 2;
    frame_h += (frame_h - h) % 2;

    let mut frame = RgbaImage::new(frame_w, frame_h);
    imageops::replace(
        &mut frame,
        image,
        i64::from((frame_w - w) / 2),
        i64::from((frame_h - h) / 2),
    );

    let rotated = rotate_about_center(
        &frame,
        -(radians as f32),
        Interpolation::Bicubic,
        Rgba([0, 0, 0, 0]),
    );

    debug!(angle, w, h, rot_w, rot_h, "rotated watermark");
    imageops::crop_imm(
        &rotated,
        (frame_w - rot_w) / 2,
        (frame_h - rot_h) / 2,
        rot_w,
        rot_h,
    )
    .to_image()
}

/// Top-left corner for a single watermark of `watermark` size on `canvas`.
///
/// The result is clamped into `[0, max(0, cw - ww)] x [0, max(0, ch - wh)]`,
/// so a watermark larger than the canvas sits at the origin.
#[must_use]
pub fn anchor_origin(
    position: Position,
    canvas: (u32, u32),
    watermark: (u32, u32),
    margin: u32,
) -> (u32, u32) {
    let (cw, ch) = (i64::from(canvas.0), i64::from(canvas.1));
    let (ww, wh) = (i64::from(watermark.0), i64::from(watermark.1));
    let m = i64::from(margin);

    let (x, y) = match position {
        Position::TopLeft => (m, m),
        Position::TopRight => (cw - ww - m, m),
        Position::BottomLeft => (m, ch - wh - m),
        Position::BottomRight => (cw - ww - m, ch - wh - m),
        Position::Center | Position::Tiled => ((cw - ww).div_euclid(2), (ch - wh).div_euclid(2)),
    };

    let x = x.clamp(0, (cw - ww).max(0));
    let y = y.clamp(0, (ch - wh).max(0));
    // Both values lie within [0, canvas side], which fits in u32.
    (
        u32::try_from(x).unwrap_or_default(),
        u32::try_from(y).unwrap_or_default(),
    )
}

/// Alpha-blend one watermark at its anchor.
#[must_use]
pub fn apply_anchored(
    canvas: &RgbaImage,
    watermark: &RgbaImage,
    position: Position,
    margin: u32,
) -> RgbaImage {
    let (x, y) = anchor_origin(position, canvas.dimensions(), watermark.dimensions(), margin);
    debug!(%position, x, y, "placing watermark");

    let mut out = canvas.clone();
    imageops::overlay(&mut out, watermark, i64::from(x), i64::from(y));
    out
}

/// Origins of every tile that touches the canvas.
///
/// Tiles step by the tile size plus `gap` (at least [`MIN_WATERMARK_SIDE`]);
/// each row is shifted right by half a step per row index, and the column
/// range is widened by `rows / 2 + 2` on both sides so the shifted rows still
/// reach both edges of tall canvases.
#[must_use]
pub fn tile_origins(canvas: (u32, u32), tile: (u32, u32), gap: u32) -> Vec<(i64, i64)> {
    let (cw, ch) = (i64::from(canvas.0), i64::from(canvas.1));
    let (ww, wh) = (i64::from(tile.0), i64::from(tile.1));
    let gap = i64::from(gap);
    let min_step = i64::from(MIN_WATERMARK_SIDE);

    let step_x = (ww + gap).max(min_step);
    let step_y = (wh + gap).max(min_step);
    let rows = (ch + step_y - 1) / step_y + 2;
    let cols = (cw + step_x - 1) / step_x + 2;
    let buffer = rows / 2 + 2;

    let mut origins = Vec::new();
    for row in -1..rows {
        let y = row * step_y;
        if y >= ch || y + wh <= 0 {
            continue;
        }
        let shift = (row * step_x).div_euclid(2);
        for col in (-1 - buffer)..(cols + buffer) {
            let x = col * step_x + shift;
            if x < cw && x + ww > 0 {
                origins.push((x, y));
            }
        }
    }
    origins
}

/// Repeat `tile` across the canvas.
///
/// Tiles are copied onto one transparent overlay, which is then alpha-blended
/// onto a copy of `canvas` in a single pass.
#[must_use]
pub fn apply_tiled(canvas: &RgbaImage, tile: &RgbaImage, gap: u32) -> RgbaImage {
    let origins = tile_origins(canvas.dimensions(), tile.dimensions(), gap);
    debug!(
        tiles = origins.len(),
        tile_w = tile.width(),
        tile_h = tile.height(),
        gap,
        "tiling watermark"
    );

    let mut overlay = RgbaImage::new(canvas.width(), canvas.height());
    for &(x, y) in &origins {
        imageops::replace(&mut overlay, tile, x, y);
    }

    let mut out = canvas.clone();
    imageops::overlay(&mut out, &overlay, 0, 0);
    out
}
