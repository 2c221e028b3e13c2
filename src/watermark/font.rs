//! Font loading and glyph rasterization for text watermarks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, PxScale, Rect, ScaleFont};
use image::GrayImage;
use tracing::{debug, warn};

use crate::config::MAX_TEXT_CANVAS_PIXELS;
use crate::error::WatermarkError;

/// DejaVu Sans, used when no font file is given or a file fails to load.
static BUILTIN_FONT_DATA: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");

/// Which font a text watermark should use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FontSource {
    /// The embedded DejaVu Sans face.
    #[default]
    Default,
    /// A TrueType or OpenType file on disk.
    Path(PathBuf),
}

/// A font ready to rasterize text.
#[derive(Clone)]
pub enum WatermarkFont {
    /// A font loaded from a file.
    File(FontArc),
    /// The embedded DejaVu Sans face.
    Builtin(FontArc),
}

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_) => f.write_str("WatermarkFont::File"),
            Self::Builtin(_) => f.write_str("WatermarkFont::Builtin"),
        }
    }
}

impl WatermarkFont {
    fn face(&self) -> &FontArc {
        match self {
            Self::File(font) | Self::Builtin(font) => font,
        }
    }

    /// Rasterize `text` at `size_pt` into a coverage mask cropped to the ink.
    ///
    /// Lines split on `\n` (or `\r\n`) are stacked left-aligned, one line
    /// height apart. The mask is empty (0x0) when nothing in `text` produces
    /// any ink.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkError::TextTooLarge`] when the mask would exceed
    /// [`MAX_TEXT_CANVAS_PIXELS`].
    pub fn rasterize(&self, text: &str, size_pt: f32) -> Result<GrayImage, WatermarkError> {
        rasterize_lines(self.face(), text, size_pt)
    }
}

/// Parsed fonts keyed by file path, plus the embedded face.
///
/// Build one per batch and pass it by `&mut` to watermark preparation so each
/// font file is read and parsed once. Files that fail to load are remembered
/// as failures and resolve to [`WatermarkFont::Builtin`] without retrying.
#[derive(Default)]
pub struct FontCache {
    builtin: Option<FontArc>,
    fonts: HashMap<PathBuf, Option<FontArc>>,
}

impl FontCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `source`, loading and caching the font file on first use.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkError::Font`] if the embedded face cannot be parsed.
    pub fn get(&mut self, source: &FontSource) -> Result<WatermarkFont, WatermarkError> {
        if let FontSource::Path(path) = source {
            let entry = self
                .fonts
                .entry(path.clone())
                .or_insert_with(|| load_font(path));
            if let Some(font) = entry {
                return Ok(WatermarkFont::File(font.clone()));
            }
        }
        self.builtin().map(WatermarkFont::Builtin)
    }

    fn builtin(&mut self) -> Result<FontArc, WatermarkError> {
        if let Some(font) = &self.builtin {
            return Ok(font.clone());
        }
        let font = FontArc::try_from_slice(BUILTIN_FONT_DATA)?;
        self.builtin = Some(font.clone());
        Ok(font)
    }

    /// Number of font files seen so far, including failed loads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Whether no font file has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache")
            .field("paths", &self.fonts.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "font loading failed, using built-in font");
            return None;
        }
    };

    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!(path = %path.display(), "font cached");
            Some(font)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "font parsing failed, using built-in font");
            None
        }
    }
}

/// List the `.ttf` and `.otf` files in `dir`, sorted by name.
///
/// A missing or unreadable directory yields an empty list.
#[must_use]
pub fn available_fonts(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        })
        .collect();
    names.sort();
    names
}

/// Lay out `text` line by line and rasterize it, cropped to the union of the
/// glyph pixel bounds.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn rasterize_lines(font: &FontArc, text: &str, size_pt: f32) -> Result<GrayImage, WatermarkError> {
    let scale = font
        .pt_to_px_scale(size_pt)
        .unwrap_or_else(|| PxScale::from(size_pt));
    let scaled = font.as_scaled(scale);
    let line_height = scaled.ascent() - scaled.descent() + scaled.line_gap();

    let mut outlines = Vec::new();
    let mut baseline = scaled.ascent();
    for line in text.lines() {
        let mut caret = 0.0_f32;
        let mut prev = None;
        for c in line.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = font.outline_glyph(glyph) {
                outlines.push(outlined);
            }
        }
        baseline += line_height;
    }

    let Some(bounds) = outlines
        .iter()
        .map(ab_glyph::OutlinedGlyph::px_bounds)
        .reduce(|a, b| Rect {
            min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        })
    else {
        return Ok(GrayImage::new(0, 0));
    };

    let width = (bounds.max.x - bounds.min.x).ceil().max(0.0) as u64;
    let height = (bounds.max.y - bounds.min.y).ceil().max(0.0) as u64;
    let fits = width
        .checked_mul(height)
        .is_some_and(|pixels| pixels <= MAX_TEXT_CANVAS_PIXELS);
    let (mask_width, mask_height) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if fits => (w, h),
        _ => return Err(WatermarkError::TextTooLarge { width, height }),
    };
    let mut mask = GrayImage::new(mask_width, mask_height);

    for outlined in &outlines {
        let glyph_bounds = outlined.px_bounds();
        let ox = (glyph_bounds.min.x - bounds.min.x) as u32;
        let oy = (glyph_bounds.min.y - bounds.min.y) as u32;
        outlined.draw(|x, y, coverage| {
            let (px, py) = (ox + x, oy + y);
            if px < mask_width && py < mask_height {
                let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = mask.get_pixel_mut(px, py);
                pixel[0] = pixel[0].max(value);
            }
        });
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink_pixels(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] > 0).count()
    }

    fn builtin() -> WatermarkFont {
        FontCache::new().get(&FontSource::Default).unwrap()
    }

    #[test]
    fn default_source_is_builtin() {
        let mut cache = FontCache::new();
        assert!(matches!(
            cache.get(&FontSource::Default),
            Ok(WatermarkFont::Builtin(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_font_degrades_and_is_cached() {
        let mut cache = FontCache::new();
        let source = FontSource::Path(PathBuf::from("/nonexistent/font.ttf"));
        assert!(matches!(cache.get(&source), Ok(WatermarkFont::Builtin(_))));
        assert!(matches!(cache.get(&source), Ok(WatermarkFont::Builtin(_))));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn corrupt_font_degrades_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        let mut cache = FontCache::new();
        assert!(matches!(
            cache.get(&FontSource::Path(path)),
            Ok(WatermarkFont::Builtin(_))
        ));
    }

    #[test]
    fn font_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.ttf");
        std::fs::write(&path, BUILTIN_FONT_DATA).unwrap();

        let mut cache = FontCache::new();
        let font = cache.get(&FontSource::Path(path)).unwrap();
        assert!(matches!(font, WatermarkFont::File(_)));
        assert!(ink_pixels(&font.rasterize("Test", 50.0).unwrap()) > 0);
    }

    #[test]
    fn available_fonts_lists_font_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.otf", "a.TTF", "notes.txt", "c.ttf"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.ttf")).unwrap();

        assert_eq!(available_fonts(dir.path()), ["a.TTF", "b.otf", "c.ttf"]);
        assert!(available_fonts(Path::new("/nonexistent/fonts")).is_empty());
    }

    #[test]
    fn builtin_crops_to_ink() {
        let font = builtin();
        let mask = font.rasterize("Test", 50.0).unwrap();
        assert!(mask.width() > 0 && mask.height() > 0);
        assert!(ink_pixels(&mask) > 0);
        assert!(mask.height() < 50 * 2);
        assert_eq!(font.rasterize(" ", 50.0).unwrap().dimensions(), (0, 0));
    }

    #[test]
    fn builtin_draws_non_ascii_glyphs() {
        let font = builtin();
        let cyrillic = font.rasterize("Київ", 40.0).unwrap();
        let missing = font.rasterize("????", 40.0).unwrap();
        assert!(ink_pixels(&cyrillic) > 0);
        assert_ne!(cyrillic, missing);
        assert_ne!(font.rasterize("é", 40.0).unwrap(), font.rasterize("?", 40.0).unwrap());
    }

    #[test]
    fn newlines_stack_lines() {
        let font = builtin();
        let one_line = font.rasterize("AB", 40.0).unwrap();
        let two_lines = font.rasterize("A\nB", 40.0).unwrap();
        let single = font.rasterize("A", 40.0).unwrap();

        assert!(two_lines.height() > single.height() * 2);
        assert!(two_lines.width() < one_line.width());
        assert_ne!(two_lines, font.rasterize("A?B", 40.0).unwrap());
        assert_eq!(font.rasterize("A\r\nB", 40.0).unwrap(), two_lines);

        // A blank middle line still takes its height.
        let spaced = font.rasterize("A\n\nB", 40.0).unwrap();
        assert!(spaced.height() > two_lines.height());
    }

    #[test]
    fn oversized_text_is_rejected_before_allocating() {
        let font = builtin();
        let long = "W".repeat(10_000);
        assert!(matches!(
            font.rasterize(&long, 1000.0),
            Err(WatermarkError::TextTooLarge { .. })
        ));
    }
}
