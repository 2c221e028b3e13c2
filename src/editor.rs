//! Per-file manual edits applied before a batch: right-angle rotation and
//! cropping, with helpers for mapping a downscaled preview back onto the
//! full-size image.
//!
//! Each file carries its own [`EditorState`]; nothing is shared between files.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

use crate::config::{OutputFormat, OutputSettings, ValidationLimits, MIN_WATERMARK_SIDE};
use crate::engine::encode_image;
use crate::error::{ConfigError, Error, ProcessingCause, ProcessingError, Result};
use crate::metadata::{load_oriented, LoadedImage};
use crate::validation::validate_image;

/// Inset of the default free-form crop box, in pixels.
const FREE_CROP_INSET: u32 = 10;
/// Smallest crop side, in pixels.
const MIN_CROP_SIDE: u32 = MIN_WATERMARK_SIDE;
/// JPEG quality used when writing edits back to the source.
const EDIT_QUALITY: u8 = 95;

/// Crop aspect ratio choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// Any shape.
    #[default]
    Free,
    /// 1:1.
    Square,
    /// 3:2.
    Classic,
    /// 4:3.
    Standard,
    /// 5:4.
    Print,
    /// 16:9.
    Widescreen,
    /// 9:16.
    Portrait,
}

impl AspectRatio {
    /// All choices, in display order.
    pub const ALL: [Self; 7] = [
        Self::Free,
        Self::Square,
        Self::Classic,
        Self::Standard,
        Self::Print,
        Self::Widescreen,
        Self::Portrait,
    ];

    /// Width and height parts of the ratio; `None` for [`AspectRatio::Free`].
    #[must_use]
    pub fn ratio(self) -> Option<(u32, u32)> {
        match self {
            Self::Free => None,
            Self::Square => Some((1, 1)),
            Self::Classic => Some((3, 2)),
            Self::Standard => Some((4, 3)),
            Self::Print => Some((5, 4)),
            Self::Widescreen => Some((16, 9)),
            Self::Portrait => Some((9, 16)),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ratio() {
            Some((w, h)) => write!(f, "{w}:{h}"),
            None => f.write_str("free"),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.to_string() == wanted)
            .ok_or_else(|| ConfigError::new("aspect ratio", format!("unknown ratio {s:?}")))
    }
}

/// A crop rectangle in full-size image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Width, at least one pixel.
    pub width: u32,
    /// Height, at least one pixel.
    pub height: u32,
}

impl CropBox {
    /// Map a rectangle drawn on a preview back to the full image.
    ///
    /// Coordinates are multiplied by `scale` (see [`proxy_scale`]), truncated,
    /// and clamped so the box stays inside an image of `image` size.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_proxy(
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        scale: f64,
        image: (u32, u32),
    ) -> Self {
        let (img_w, img_h) = image;
        let to_full = |v: f64| {
            let scaled = (v * scale).floor();
            if scaled.is_finite() && scaled > 0.0 {
                scaled.min(f64::from(u32::MAX)) as u32
            } else {
                0
            }
        };

        let left = to_full(left).min(img_w.saturating_sub(1));
        let top = to_full(top).min(img_h.saturating_sub(1));
        let width = to_full(width).min(img_w - left).max(1);
        let height = to_full(height).min(img_h - top).max(1);
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge, exclusive.
    #[must_use]
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Bottom edge, exclusive.
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Largest crop box for `aspect` on a `width` x `height` image.
///
/// Free crops are inset by 10 px on each side. Fixed ratios take the widest
/// centered box that fits; both sides are kept at 10 px or more.
#[must_use]
pub fn max_crop_box(width: u32, height: u32, aspect: AspectRatio) -> CropBox {
    let Some((ratio_w, ratio_h)) = aspect.ratio() else {
        return CropBox {
            left: FREE_CROP_INSET,
            top: FREE_CROP_INSET,
            width: width.saturating_sub(2 * FREE_CROP_INSET).max(MIN_CROP_SIDE),
            height: height.saturating_sub(2 * FREE_CROP_INSET).max(MIN_CROP_SIDE),
        };
    };

    let (w, h) = (u64::from(width), u64::from(height));
    let (rw, rh) = (u64::from(ratio_w), u64::from(ratio_h));
    let (mut try_w, mut try_h) = (w, w * rh / rw);
    if try_h > h {
        try_h = h;
        try_w = h * rw / rh;
    }

    let clamp = |v: u64, max: u32| u32::try_from(v).unwrap_or(max).min(max).max(MIN_CROP_SIDE);
    let try_w = clamp(try_w, width);
    let try_h = clamp(try_h, height);
    CropBox {
        left: width.saturating_sub(try_w) / 2,
        top: height.saturating_sub(try_h) / 2,
        width: try_w,
        height: try_h,
    }
}

/// Factor from preview pixels to full-size pixels for a preview at most
/// `target_width` wide.
#[must_use]
pub fn proxy_scale(width: u32, target_width: u32) -> f64 {
    if target_width == 0 || width <= target_width {
        1.0
    } else {
        f64::from(width) / f64::from(target_width)
    }
}

/// Downscale `image` for previewing, returning it with its [`proxy_scale`].
///
/// Previews are normally [`PROXY_IMAGE_WIDTH`](crate::config::PROXY_IMAGE_WIDTH)
/// wide.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn create_proxy(image: &DynamicImage, target_width: u32) -> (DynamicImage, f64) {
    let scale = proxy_scale(image.width(), target_width);
    if (scale - 1.0).abs() < f64::EPSILON {
        return (image.clone(), 1.0);
    }
    let ratio = f64::from(target_width) / f64::from(image.width());
    let new_h = ((f64::from(image.height()) * ratio) as u32).max(1);
    debug!(
        width = image.width(),
        height = image.height(),
        target_width,
        new_h,
        scale,
        "preview created"
    );
    (
        image.resize_exact(target_width, new_h, FilterType::Lanczos3),
        scale,
    )
}

/// Edits pending for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditorState {
    rotation: i32,
    /// Crop in the coordinates of the rotated image.
    pub crop: Option<CropBox>,
}

impl EditorState {
    /// Turn a quarter counter-clockwise.
    pub fn rotate_left(&mut self) {
        self.rotation = (self.rotation - 90).rem_euclid(360);
        self.crop = None;
    }

    /// Turn a quarter clockwise.
    pub fn rotate_right(&mut self) {
        self.rotation = (self.rotation + 90).rem_euclid(360);
        self.crop = None;
    }

    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    #[must_use]
    pub fn normalized_rotation(&self) -> u32 {
        self.rotation.rem_euclid(360).unsigned_abs()
    }

    /// Drop every pending edit.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether applying this state would change nothing.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.normalized_rotation() == 0 && self.crop.is_none()
    }
}

/// Apply `state` to `image`: rotate first, then crop.
///
/// A crop that reaches past the rotated image is clipped to it.
#[must_use]
pub fn apply_edits(image: DynamicImage, state: &EditorState) -> DynamicImage {
    let rotated = match state.normalized_rotation() {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    };

    match state.crop {
        Some(crop) => {
            let (w, h) = (rotated.width(), rotated.height());
            let left = crop.left.min(w.saturating_sub(1));
            let top = crop.top.min(h.saturating_sub(1));
            let width = crop.width.min(w - left).max(1);
            let height = crop.height.min(h - top).max(1);
            rotated.crop_imm(left, top, width, height)
        }
        None => rotated,
    }
}

/// Apply `state` to the file at `path` and overwrite it.
///
/// The file is decoded upright, edited and re-encoded in its own format
/// (JPEG at quality 95 with its EXIF kept). Returns the new dimensions.
///
/// # Errors
///
/// [`Error::Validation`] if the file is rejected, [`Error::Processing`] if it
/// cannot be decoded, encoded or written.
pub fn save_edits(
    path: &Path,
    state: &EditorState,
    limits: &ValidationLimits,
) -> Result<(u32, u32)> {
    validate_image(path, limits)?;

    let filename = path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );
    let fail = |cause: ProcessingCause| {
        Error::from(ProcessingError {
            filename: filename.clone(),
            source: cause,
        })
    };

    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<OutputFormat>().ok())
        .unwrap_or_default();

    let LoadedImage { image, exif } = load_oriented(path).map_err(fail)?;
    let edited = apply_edits(image, state).to_rgba8();
    let settings = OutputSettings {
        format,
        quality: EDIT_QUALITY,
    };
    let bytes = encode_image(&edited, &settings, exif.as_deref()).map_err(fail)?;
    std::fs::write(path, bytes).map_err(|e| fail(e.into()))?;

    let dimensions = edited.dimensions();
    info!(
        path = %path.display(),
        rotation = state.normalized_rotation(),
        width = dimensions.0,
        height = dimensions.1,
        "edits saved"
    );
    Ok(dimensions)
}
