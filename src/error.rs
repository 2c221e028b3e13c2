//! Error types for the photo-watermarker crate.
//!
//! Errors are split by the stage that raises them. [`ValidationError`],
//! [`WatermarkError`] and [`ConfigError`] are raised before any pixel work
//! starts; [`ProcessingError`] wraps a failure inside the per-file pipeline and
//! carries the source filename so a batch can report it and move on.

use std::path::PathBuf;

use crate::config::{MAX_TEXT_CANVAS_PIXELS, MAX_TEXT_SIZE_PT, MIN_TEXT_SIZE_PT};

/// A source file was rejected before processing.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The supplied path was empty.
    #[error("file path is empty")]
    EmptyPath,

    /// Nothing exists at the path.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The file extension is not one of the accepted image formats.
    #[error("unsupported format: {0}")]
    UnsupportedExtension(String),

    /// The file exceeds the configured size limit.
    #[error("file too large: {:.1} MB (limit {:.1} MB)", megabytes(.size), megabytes(.limit))]
    TooLarge {
        /// File size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// The file header could not be decoded as an image.
    #[error("corrupted image: {0}")]
    Corrupted(String),

    /// Image dimensions fall outside the configured range.
    #[error("image dimensions {width}x{height} outside allowed range {min}..={max}")]
    Dimensions {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Smallest accepted side.
        min: u32,
        /// Largest accepted side.
        max: u32,
    },

    /// A colour string was not in `#RRGGBB` form.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// Reading file metadata failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / 1_048_576.0
}

/// The shared watermark asset could not be built.
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    /// No watermark bytes were supplied.
    #[error("watermark bytes are empty")]
    Empty,

    /// The watermark bytes are not a decodable image.
    #[error("failed to decode watermark: {0}")]
    Decode(#[source] image::ImageError),

    /// The text size is not a finite value within the accepted range.
    #[error("text size {0} pt is outside {min}..={max} pt", min = MIN_TEXT_SIZE_PT, max = MAX_TEXT_SIZE_PT)]
    InvalidTextSize(f32),

    /// The rendered text would exceed the largest accepted canvas.
    #[error("text watermark too large: {width}x{height} (limit {limit} pixels)", limit = MAX_TEXT_CANVAS_PIXELS)]
    TextTooLarge {
        /// Requested canvas width in pixels.
        width: u64,
        /// Requested canvas height in pixels.
        height: u64,
    },

    /// The built-in font could not be parsed.
    #[error("built-in font is unusable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),

    /// The decoded watermark has a zero dimension.
    #[error("invalid watermark dimensions: {width}x{height}")]
    ZeroSize {
        /// Watermark width in pixels.
        width: u32,
        /// Watermark height in pixels.
        height: u32,
    },
}

/// A configuration value is out of range.
#[derive(Debug, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    /// Name of the offending setting.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Underlying cause of a [`ProcessingError`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessingCause {
    /// Decoding, resizing or encoding through the `image` crate failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Reading the source or writing output failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An encoder rejected the canvas.
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// A single file failed inside the pipeline after passing validation.
#[derive(Debug, thiserror::Error)]
#[error("failed to process {filename}: {source}")]
pub struct ProcessingError {
    /// Name of the source file that failed.
    pub filename: String,
    /// What went wrong.
    #[source]
    pub source: ProcessingCause,
}

/// Errors that can occur anywhere in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source file failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The watermark asset could not be prepared.
    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    /// A configuration value is out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A file failed during resize, composite or export.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// An I/O error occurred outside the per-file pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the ZIP archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let missing = ValidationError::NotFound(PathBuf::from("/tmp/gone.jpg"));
        assert!(missing.to_string().contains("gone.jpg"));

        let too_large = ValidationError::TooLarge {
            size: 150 * 1_048_576,
            limit: 100 * 1_048_576,
        };
        let msg = too_large.to_string();
        assert!(msg.contains("150.0 MB"));
        assert!(msg.contains("100.0 MB"));

        let dims = ValidationError::Dimensions {
            width: 5,
            height: 20,
            min: 10,
            max: 10_000,
        };
        assert!(dims.to_string().contains("5x20"));

        let zero = WatermarkError::ZeroSize {
            width: 0,
            height: 12,
        };
        assert!(zero.to_string().contains("0x12"));
    }

    #[test]
    fn processing_error_names_the_file() {
        let err = ProcessingError {
            filename: "holiday.jpg".to_string(),
            source: ProcessingCause::Encode("buffer too small".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("holiday.jpg"));
        assert!(msg.contains("buffer too small"));

        let wrapped: Error = err.into();
        assert!(matches!(wrapped, Error::Processing(_)));
    }

    #[test]
    fn config_error_names_the_field() {
        let err = ConfigError::new("quality", "must be within 1..=100, got 0");
        assert_eq!(err.to_string(), "invalid quality: must be within 1..=100, got 0");
    }
}
