//! Watermark preparation: turn a text or image source into a ready-to-paste
//! RGBA asset with its opacity baked into the alpha channel.
//!
//! The asset is built once per batch and shared read-only by every worker.

mod font;

use image::{Rgb, Rgba, RgbaImage};
use tracing::debug;

use crate::config::{DEFAULT_TEXT_SIZE_PT, MAX_TEXT_SIZE_PT, MIN_TEXT_SIZE_PT, TEXT_PADDING};
use crate::error::WatermarkError;

pub use font::{available_fonts, FontCache, FontSource, WatermarkFont};

/// A text watermark request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextWatermark {
    /// Text to draw; `\n` starts a new line. Leading and trailing
    /// whitespace is ignored.
    pub text: String,
    /// Font to draw with.
    pub font: FontSource,
    /// Size in points, within [`MIN_TEXT_SIZE_PT`]..=[`MAX_TEXT_SIZE_PT`].
    pub size_pt: f32,
    /// Fill colour; drawn at full alpha.
    pub color: Rgb<u8>,
}

impl TextWatermark {
    /// White text in the built-in font at the default size.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: FontSource::Default,
            size_pt: DEFAULT_TEXT_SIZE_PT,
            color: Rgb([255, 255, 255]),
        }
    }
}

/// Where the watermark comes from. Text wins when both are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatermarkSource {
    /// Text watermark, used when its text is not blank.
    pub text: Option<TextWatermark>,
    /// Encoded logo image (PNG, JPEG or WebP bytes).
    pub image: Option<Vec<u8>>,
}

/// A prepared watermark: never zero-sized, opacity already applied.
#[derive(Clone)]
pub struct WatermarkAsset {
    image: RgbaImage,
    opacity: f32,
}

impl WatermarkAsset {
    /// Wrap an RGBA image at full opacity.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkError::ZeroSize`] if either side is zero.
    pub fn new(image: RgbaImage) -> Result<Self, WatermarkError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(WatermarkError::ZeroSize { width, height });
        }
        Ok(Self {
            image,
            opacity: 1.0,
        })
    }

    /// Decode an encoded image into an asset at full opacity.
    ///
    /// # Errors
    ///
    /// See [`load_watermark_from_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WatermarkError> {
        load_watermark_from_bytes(bytes)
    }

    /// Bake `opacity` into the alpha channel.
    #[must_use]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = if opacity.is_nan() {
            self.opacity
        } else {
            opacity.clamp(0.0, 1.0)
        };
        Self {
            image: apply_opacity(self.image, opacity),
            opacity: self.opacity * opacity,
        }
    }

    /// The RGBA pixels.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Opacity that was baked into the pixels.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl std::fmt::Debug for WatermarkAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.image.dimensions();
        f.debug_struct("WatermarkAsset")
            .field("width", &width)
            .field("height", &height)
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// Decode watermark bytes to RGBA.
///
/// # Errors
///
/// [`WatermarkError::Empty`] for no bytes, [`WatermarkError::Decode`] when the
/// format is not recognised or decoding fails, [`WatermarkError::ZeroSize`]
/// for a degenerate image.
pub fn load_watermark_from_bytes(bytes: &[u8]) -> Result<WatermarkAsset, WatermarkError> {
    if bytes.is_empty() {
        return Err(WatermarkError::Empty);
    }
    let image = image::load_from_memory(bytes)
        .map_err(WatermarkError::Decode)?
        .to_rgba8();
    WatermarkAsset::new(image)
}

/// Render `text` onto a tight transparent canvas.
///
/// The canvas is the ink bounding box plus [`TEXT_PADDING`] on every side.
/// Glyph coverage becomes alpha; colour channels are the requested colour.
/// Returns `Ok(None)` for blank text.
///
/// # Errors
///
/// [`WatermarkError::InvalidTextSize`] for a size outside
/// [`MIN_TEXT_SIZE_PT`]..=[`MAX_TEXT_SIZE_PT`] (or not finite),
/// [`WatermarkError::TextTooLarge`] when the text would not fit a canvas.
pub fn render_text(
    text: &TextWatermark,
    fonts: &mut FontCache,
) -> Result<Option<RgbaImage>, WatermarkError> {
    let trimmed = text.text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !(MIN_TEXT_SIZE_PT..=MAX_TEXT_SIZE_PT).contains(&text.size_pt) {
        return Err(WatermarkError::InvalidTextSize(text.size_pt));
    }

    let font = fonts.get(&text.font)?;
    let mask = font.rasterize(trimmed, text.size_pt)?;
    if mask.width() == 0 || mask.height() == 0 {
        return Ok(None);
    }

    let padding = TEXT_PADDING;
    let mut canvas = RgbaImage::new(mask.width() + 2 * padding, mask.height() + 2 * padding);
    let Rgb([r, g, b]) = text.color;
    for (x, y, coverage) in mask.enumerate_pixels() {
        if coverage[0] > 0 {
            canvas.put_pixel(x + padding, y + padding, Rgba([r, g, b, coverage[0]]));
        }
    }

    debug!(
        text = trimmed,
        ?font,
        width = canvas.width(),
        height = canvas.height(),
        "text watermark rendered"
    );
    Ok(Some(canvas))
}

/// Multiply the alpha channel by `opacity`.
///
/// Values at or above `1.0` (and NaN) return the image untouched; values
/// below zero clear the alpha channel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_opacity(mut image: RgbaImage, opacity: f32) -> RgbaImage {
    if opacity.is_nan() || opacity >= 1.0 {
        return image;
    }
    let opacity = opacity.max(0.0);
    for pixel in image.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * opacity).round() as u8;
    }
    image
}

/// Build the batch's watermark asset from `source`.
///
/// Text is used when present and not blank; otherwise the image bytes are
/// decoded. Returns `Ok(None)` when neither yields a watermark.
///
/// # Errors
///
/// Returns [`WatermarkError`] when the text cannot be rendered or image bytes
/// are supplied but unusable.
pub fn prepare_watermark(
    source: &WatermarkSource,
    opacity: f32,
    fonts: &mut FontCache,
) -> Result<Option<WatermarkAsset>, WatermarkError> {
    if let Some(text) = &source.text {
        if let Some(rendered) = render_text(text, fonts)? {
            return WatermarkAsset::new(rendered).map(|asset| Some(asset.with_opacity(opacity)));
        }
    }

    match source.image.as_deref() {
        Some(bytes) => load_watermark_from_bytes(bytes).map(|asset| Some(asset.with_opacity(opacity))),
        None => Ok(None),
    }
}
