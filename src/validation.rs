//! Source-file validation and small input sanitizers.
//!
//! [`validate_image`] runs before any pixel work. It reads only file metadata
//! and the image header, so full decoding happens once, in the pipeline.

use std::path::Path;

use image::{ImageReader, Rgb};

use crate::config::{ValidationLimits, MAX_FILENAME_LENGTH};
use crate::error::ValidationError;

/// Extensions accepted as processing input.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Validate a source image file against `limits`.
///
/// Checks, in order: non-empty path, existence, regular file, extension, file
/// size, decodable header, and dimensions within `[min, max]`.
///
/// # Errors
///
/// Returns the [`ValidationError`] for the first failed check.
pub fn validate_image(path: &Path, limits: &ValidationLimits) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }

    if !is_supported_image(path) {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        return Err(ValidationError::UnsupportedExtension(ext));
    }

    let size = std::fs::metadata(path)?.len();
    if size > limits.max_file_size {
        return Err(ValidationError::TooLarge {
            size,
            limit: limits.max_file_size,
        });
    }

    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| ValidationError::Corrupted(e.to_string()))?;

    let in_range = |side: u32| (limits.min_dimension..=limits.max_dimension).contains(&side);
    if !in_range(width) || !in_range(height) {
        return Err(ValidationError::Dimensions {
            width,
            height,
            min: limits.min_dimension,
            max: limits.max_dimension,
        });
    }

    Ok(())
}

/// Make an uploaded filename safe to write.
///
/// Drops any directory part, removes `<>:"|?*` and control characters,
/// replaces spaces with `_`, and truncates to [`MAX_FILENAME_LENGTH`]
/// characters while keeping the extension. An empty result becomes `unnamed`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') && !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "unnamed".to_string();
    }

    if cleaned.chars().count() <= MAX_FILENAME_LENGTH {
        return cleaned;
    }

    let (stem, ext) = match cleaned.rfind('.') {
        Some(dot) if dot > 0 => cleaned.split_at(dot),
        _ => (cleaned.as_str(), ""),
    };
    let keep = MAX_FILENAME_LENGTH.saturating_sub(ext.chars().count());
    let mut truncated: String = stem.chars().take(keep).collect();
    truncated.push_str(ext);
    truncated
}

/// Parse a `#RRGGBB` colour.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidColor`] unless the input is `#` followed
/// by exactly six hex digits.
pub fn parse_hex_color(hex: &str) -> Result<Rgb<u8>, ValidationError> {
    let invalid = || ValidationError::InvalidColor(hex.to_string());

    let digits = hex.trim().strip_prefix('#').ok_or_else(invalid)?;
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}
