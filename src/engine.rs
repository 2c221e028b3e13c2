//! Per-file watermarking pipeline.
//!
//! [`process_image`] validates a source, decodes it upright, resizes it,
//! composites the shared watermark and encodes the result in memory. It has
//! no side effects besides reading the source, so any number of calls can run
//! side by side on one [`WatermarkAsset`].

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageError, Rgb, RgbImage, RgbaImage};
use tracing::{debug, info};

use crate::config::{NamingMode, NamingOptions, OutputFormat, OutputSettings, ProcessOptions};
use crate::error::{Error, ProcessingCause, ProcessingError, Result};
use crate::metadata::{embed_exif_in_webp, load_oriented, LoadedImage};
use crate::placement::apply_watermark;
use crate::resize::calculate_resize;
use crate::validation::validate_image;
use crate::watermark::WatermarkAsset;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Name the output was written under.
    pub filename: String,
    /// Source resolution after orientation, as `WxH`.
    pub original_resolution: String,
    /// Output resolution, as `WxH`.
    pub new_resolution: String,
    /// Source file size in bytes.
    pub original_size: u64,
    /// Encoded output size in bytes.
    pub new_size: u64,
    /// Resize factor, as `"0.50x"`.
    pub scale_factor: String,
}

impl fmt::Display for ProcessingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({}), {} -> {}",
            self.filename,
            self.original_resolution,
            self.new_resolution,
            self.scale_factor,
            human_size(self.original_size),
            human_size(self.new_size),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// Encoded output of one file plus its statistics.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Encoded image in the requested format.
    pub bytes: Vec<u8>,
    /// Sizes and resolutions before and after.
    pub stats: ProcessingStats,
}

impl ProcessedImage {
    /// Output filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.stats.filename
    }
}

/// Run the full pipeline on one source file.
///
/// Steps: validate, decode upright, resize, composite `watermark` (if any),
/// encode to `options.output`. The returned bytes are named
/// `output_filename` in the stats.
///
/// # Errors
///
/// [`Error::Config`] for invalid options, [`Error::Validation`] for a rejected
/// source, and [`Error::Processing`] carrying the source filename when
/// decoding, resizing or encoding fails.
pub fn process_image(
    source: &Path,
    output_filename: &str,
    watermark: Option<&WatermarkAsset>,
    options: &ProcessOptions,
) -> Result<ProcessedImage> {
    options.validate()?;
    validate_image(source, &options.limits)?;

    let source_name = source.file_name().map_or_else(
        || source.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );
    let fail = |cause: ProcessingCause| {
        Error::from(ProcessingError {
            filename: source_name.clone(),
            source: cause,
        })
    };

    let original_size = std::fs::metadata(source)
        .map_err(|e| fail(e.into()))?
        .len();
    let LoadedImage { image, exif } = load_oriented(source).map_err(fail)?;

    let mut canvas = image.to_rgba8();
    let (orig_w, orig_h) = canvas.dimensions();
    let (new_w, new_h, scale) = calculate_resize(orig_w, orig_h, &options.resize);
    if (new_w, new_h) != (orig_w, orig_h) {
        debug!(orig_w, orig_h, new_w, new_h, "resizing");
        canvas = imageops::resize(&canvas, new_w, new_h, FilterType::Lanczos3);
    }

    if let Some(asset) = watermark {
        canvas = apply_watermark(&canvas, asset, &options.placement);
    }

    let bytes = encode_image(&canvas, &options.output, exif.as_deref()).map_err(fail)?;

    let stats = ProcessingStats {
        filename: output_filename.to_string(),
        original_resolution: format!("{orig_w}x{orig_h}"),
        new_resolution: format!("{new_w}x{new_h}"),
        original_size,
        new_size: bytes.len() as u64,
        scale_factor: format!("{scale:.2}x"),
    };
    info!(source = %source_name, output = output_filename, "{stats}");

    Ok(ProcessedImage { bytes, stats })
}

/// Encode a finished canvas.
///
/// JPEG is flattened onto white and written without chroma subsampling; PNG
/// keeps alpha at best compression; WebP keeps alpha and is lossy at the
/// given quality. `exif` (if any) is attached to JPEG and WebP output.
///
/// # Errors
///
/// Returns [`ProcessingCause`] if the encoder fails.
pub fn encode_image(
    canvas: &RgbaImage,
    settings: &OutputSettings,
    exif: Option<&[u8]>,
) -> std::result::Result<Vec<u8>, ProcessingCause> {
    let (width, height) = canvas.dimensions();
    match settings.format {
        OutputFormat::Jpeg => {
            let flat = flatten_onto_white(canvas);
            let mut buf = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, settings.quality);
            if let Some(exif) = exif {
                encoder
                    .set_exif_metadata(exif.to_vec())
                    .map_err(ImageError::Unsupported)?;
            }
            encoder.encode_image(&flat)?;
            Ok(buf)
        }
        OutputFormat::Png => {
            let mut buf = Cursor::new(Vec::new());
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive)
                .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)?;
            Ok(buf.into_inner())
        }
        OutputFormat::Webp => {
            let encoded = webp::Encoder::from_rgba(canvas.as_raw(), width, height)
                .encode_simple(false, f32::from(settings.quality))
                .map_err(|e| ProcessingCause::Encode(format!("webp: {e:?}")))?
                .to_vec();
            Ok(match exif {
                Some(exif) => embed_exif_in_webp(encoded, exif, (width, height)),
                None => encoded,
            })
        }
    }
}

/// Composite RGBA onto an opaque white background.
#[must_use]
pub fn flatten_onto_white(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let [r, g, b, a] = canvas.get_pixel(x, y).0;
        let a = u16::from(a);
        let mix = |c: u8| {
            let v = (u16::from(c) * a + 255 * (255 - a) + 127) / 255;
            u8::try_from(v).unwrap_or(u8::MAX)
        };
        Rgb([mix(r), mix(g), mix(b)])
    })
}

/// Build the output filename for the `index`-th (1-based) file of a batch.
///
/// `KeepOriginal` slugs the original stem and prepends the slugged prefix
/// with `_` when one is set; `PrefixSequence` yields `{prefix}_{index:03}`,
/// falling back to `image` as the prefix.
#[must_use]
pub fn generate_filename(
    original: &str,
    naming: &NamingOptions,
    extension: &str,
    index: usize,
) -> String {
    let prefix = slugify(&naming.prefix);

    match naming.mode {
        NamingMode::PrefixSequence => {
            let base = if prefix.is_empty() { "image" } else { &prefix };
            format!("{base}_{index:03}.{extension}")
        }
        NamingMode::KeepOriginal => {
            let stem = Path::new(original)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut slug = slugify(&stem);
            if slug.is_empty() {
                slug = "image".to_string();
            }
            if prefix.is_empty() {
                format!("{slug}.{extension}")
            } else {
                format!("{prefix}_{slug}.{extension}")
            }
        }
    }
}

/// Transliterate, lowercase, and collapse every run of non-alphanumerics to
/// a single `-`, trimmed from both ends.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in transliterate(text).chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Ukrainian national romanization, with the few Russian-only letters added.
fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    let mut prev = None;

    for c in text.chars() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        let latin = match lower {
            'а' => "a",
            'б' => "b",
            'в' => "v",
            'г' if prev == Some('з') => "gh",
            'г' => "h",
            'ґ' => "g",
            'д' => "d",
            'е' | 'э' => "e",
            'є' if word_start => "ye",
            'є' => "ie",
            'ж' => "zh",
            'з' => "z",
            'и' | 'ы' => "y",
            'і' => "i",
            'ї' if word_start => "yi",
            'ї' => "i",
            'й' if word_start => "y",
            'й' => "i",
            'к' => "k",
            'л' => "l",
            'м' => "m",
            'н' => "n",
            'о' => "o",
            'п' => "p",
            'р' => "r",
            'с' => "s",
            'т' => "t",
            'у' => "u",
            'ф' => "f",
            'х' => "kh",
            'ц' => "ts",
            'ч' => "ch",
            'ш' => "sh",
            'щ' => "shch",
            'ю' if word_start => "yu",
            'ю' => "iu",
            'я' if word_start => "ya",
            'я' => "ia",
            'ё' => "yo",
            'ь' | 'ъ' | '\'' | '’' | 'ʼ' => "",
            _ => {
                out.push(c);
                word_start = !c.is_alphanumeric();
                prev = Some(lower);
                continue;
            }
        };

        if c.is_uppercase() {
            let mut chars = latin.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(latin);
        }
        if !latin.is_empty() {
            word_start = false;
        }
        prev = Some(lower);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Position, ResizeConfig, ResizeMode};
    use crate::metadata::tests::tiff_with_orientation;
    use image::codecs::jpeg::JpegDecoder;
    use image::codecs::webp::WebPDecoder;
    use image::{ImageDecoder, ImageFormat, Rgba};

    fn write_image(dir: &Path, name: &str, w: u32, h: u32, format: ImageFormat) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
            .save_with_format(&path, format)
            .unwrap();
        path
    }

    #[test]
    fn filenames_keep_original_slug() {
        let naming = NamingOptions::default();
        assert_eq!(generate_filename("My Photo (1).JPG", &naming, "jpg", 1), "my-photo-1.jpg");
        assert_eq!(generate_filename("/tmp/a_b.png", &naming, "webp", 4), "a-b.webp");
        assert_eq!(generate_filename("___.png", &naming, "png", 1), "image.png");

        let prefixed = NamingOptions {
            prefix: "Summer Trip".to_string(),
            ..NamingOptions::default()
        };
        assert_eq!(
            generate_filename("beach.jpg", &prefixed, "jpg", 1),
            "summer-trip_beach.jpg"
        );
    }

    #[test]
    fn filenames_in_sequence() {
        let mut naming = NamingOptions {
            mode: NamingMode::PrefixSequence,
            prefix: String::new(),
        };
        assert_eq!(generate_filename("x.jpg", &naming, "jpg", 7), "image_007.jpg");
        naming.prefix = "Відпустка".to_string();
        assert_eq!(generate_filename("x.jpg", &naming, "png", 12), "vidpustka_012.png");
        assert_eq!(generate_filename("x.jpg", &naming, "png", 1234), "vidpustka_1234.png");
    }

    #[test]
    fn cyrillic_is_transliterated() {
        assert_eq!(slugify("Київ"), "kyiv");
        assert_eq!(slugify("Згорани"), "zghorany");
        assert_eq!(slugify("Юлія Єрмак"), "yuliia-yermak");
        assert_eq!(slugify("  --Фото №5-- "), "foto-5");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn flatten_uses_alpha_as_mask() {
        let mut rgba = RgbaImage::new(3, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(2, 0, Rgba([255, 0, 0, 128]));
        let flat = flatten_onto_white(&rgba);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(2, 0), &Rgb([255, 127, 127]));
    }

    #[test]
    fn encodes_each_format() {
        let canvas = RgbaImage::from_pixel(16, 8, Rgba([10, 200, 30, 128]));

        let jpeg = encode_image(&canvas, &OutputSettings::default(), None).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

        let png_settings = OutputSettings {
            format: OutputFormat::Png,
            quality: 80,
        };
        let png = encode_image(&canvas, &png_settings, None).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3), &Rgba([10, 200, 30, 128]));

        let webp_settings = OutputSettings {
            format: OutputFormat::Webp,
            quality: 75,
        };
        let webp = encode_image(&canvas, &webp_settings, None).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn jpeg_output_carries_exif() {
        let canvas = RgbaImage::from_pixel(16, 8, Rgba([0, 0, 0, 255]));
        let exif = tiff_with_orientation(1, true);

        let jpeg = encode_image(&canvas, &OutputSettings::default(), Some(&exif)).unwrap();
        let mut decoder = JpegDecoder::new(Cursor::new(&jpeg)).unwrap();
        assert_eq!(decoder.exif_metadata().unwrap(), Some(exif));
    }

    #[test]
    fn webp_output_carries_exif() {
        let canvas = RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 255]));
        let exif = tiff_with_orientation(1, false);
        let settings = OutputSettings {
            format: OutputFormat::Webp,
            quality: 80,
        };

        let webp = encode_image(&canvas, &settings, Some(&exif)).unwrap();
        let mut decoder = WebPDecoder::new(Cursor::new(&webp)).unwrap();
        assert_eq!(decoder.dimensions(), (16, 8));
        assert_eq!(decoder.exif_metadata().unwrap(), Some(exif));
    }

    #[test]
    fn jpeg_chroma_is_not_subsampled() {
        let canvas = RgbaImage::from_pixel(32, 32, Rgba([200, 30, 30, 255]));
        let jpeg = encode_image(&canvas, &OutputSettings::default(), None).unwrap();

        // Baseline frame header: FFC0, length, precision, height, width,
        // component count, then (id, sampling, table) per component.
        let sof = jpeg
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .unwrap();
        let components = usize::from(jpeg[sof + 9]);
        assert_eq!(components, 3);
        for c in 0..components {
            assert_eq!(jpeg[sof + 10 + c * 3 + 1], 0x11, "component {c} is subsampled");
        }
    }

    #[test]
    fn process_resizes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "white.jpg", 800, 600, ImageFormat::Jpeg);
        let options = ProcessOptions {
            resize: ResizeConfig::new(ResizeMode::MaxSide, 400),
            ..ProcessOptions::default()
        };

        let result = process_image(&src, "white.jpg", None, &options).unwrap();
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));

        let stats = &result.stats;
        assert_eq!(stats.filename, "white.jpg");
        assert_eq!(stats.original_resolution, "800x600");
        assert_eq!(stats.new_resolution, "400x300");
        assert_eq!(stats.scale_factor, "0.50x");
        assert_eq!(stats.new_size, result.bytes.len() as u64);
        assert!(stats.original_size > 0);
        assert!(stats.to_string().contains("800x600 -> 400x300"));
    }

    #[test]
    fn process_rejects_invalid_sources_and_options() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        assert!(matches!(
            process_image(&missing, "gone.jpg", None, &ProcessOptions::default()),
            Err(Error::Validation(_))
        ));

        let src = write_image(dir.path(), "ok.png", 64, 64, ImageFormat::Png);
        let mut options = ProcessOptions::default();
        options.placement.position = Position::Tiled;
        options.placement.opacity = 3.0;
        assert!(matches!(
            process_image(&src, "ok.png", None, &options),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn process_errors_name_the_source() {
        let dir = tempfile::tempdir().unwrap();
        // Valid PNG header, truncated pixel data.
        let src = dir.path().join("cut.png");
        RgbImage::from_fn(128, 128, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, (x ^ y) as u8]))
            .save_with_format(&src, ImageFormat::Png)
            .unwrap();
        let bytes = std::fs::read(&src).unwrap();
        std::fs::write(&src, &bytes[..bytes.len() / 2]).unwrap();

        match process_image(&src, "cut.jpg", None, &ProcessOptions::default()) {
            Err(Error::Processing(err)) => assert_eq!(err.filename, "cut.png"),
            other => panic!("expected processing error, got {other:?}"),
        }
    }
}
