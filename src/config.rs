//! Typed configuration for resize, placement, export and validation.
//!
//! Every setting the pipeline reads lives in one of these structs. Each has a
//! `Default` matching the stock settings and a `validate()` that rejects
//! out-of-range values up front, so a bad setting fails the batch before any
//! file is touched.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Largest accepted source file, in bytes.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
/// Longest output filename, in characters.
pub const MAX_FILENAME_LENGTH: usize = 255;
/// Smallest accepted image side, in pixels.
pub const MIN_IMAGE_DIMENSION: u32 = 10;
/// Largest accepted image side, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 10_000;
/// Transparent padding around rendered text, per side, in pixels.
pub const TEXT_PADDING: u32 = 20;
/// Default text watermark size in points.
pub const DEFAULT_TEXT_SIZE_PT: f32 = 100.0;
/// Smallest accepted text watermark size in points.
pub const MIN_TEXT_SIZE_PT: f32 = 1.0;
/// Largest accepted text watermark size in points.
pub const MAX_TEXT_SIZE_PT: f32 = 1000.0;
/// Largest rendered text canvas, in pixels.
pub const MAX_TEXT_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;
/// Smallest side of a scaled watermark and of a tiling step, in pixels.
pub const MIN_WATERMARK_SIDE: u32 = 10;
/// Lower bound applied to the watermark scale fraction.
pub const MIN_WATERMARK_SCALE: f32 = 0.01;
/// Worker thread bounds for batch runs.
pub const MIN_THREADS: usize = 1;
/// Upper bound on worker threads for batch runs.
pub const MAX_THREADS: usize = 8;
/// Default worker thread count.
pub const DEFAULT_THREADS: usize = 2;
/// Width of the editor preview image.
pub const PROXY_IMAGE_WIDTH: u32 = 700;

/// Named long-side targets offered for quick resizing.
pub const RESIZE_PRESETS: [(&str, u32); 4] =
    [("HD", 1280), ("FHD", 1920), ("2K", 2560), ("4K", 3840)];

/// Look up a resize preset by name, case-insensitively.
#[must_use]
pub fn resize_preset(name: &str) -> Option<u32> {
    RESIZE_PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|&(_, value)| value)
}

/// Which dimension anchors a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Shrink so the longer side equals the target; never upscales.
    #[default]
    MaxSide,
    /// Scale so the width equals the target.
    ExactWidth,
    /// Scale so the height equals the target.
    ExactHeight,
}

/// Resize rules for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeConfig {
    /// Whether resizing happens at all.
    pub enabled: bool,
    /// Anchor dimension.
    pub mode: ResizeMode,
    /// Target size of the anchor dimension, in pixels.
    pub value: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ResizeMode::MaxSide,
            value: 1920,
        }
    }
}

impl ResizeConfig {
    /// Enabled resize with the given mode and target.
    #[must_use]
    pub fn new(mode: ResizeMode, value: u32) -> Self {
        Self {
            enabled: true,
            mode,
            value,
        }
    }

    /// Reject an enabled resize with a zero or oversized target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `value` is outside `1..=MAX_IMAGE_DIMENSION`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && !(1..=MAX_IMAGE_DIMENSION).contains(&self.value) {
            return Err(ConfigError::new(
                "resize value",
                format!(
                    "must be within 1..={MAX_IMAGE_DIMENSION}, got {}",
                    self.value
                ),
            ));
        }
        Ok(())
    }
}

/// Where the watermark goes on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Single copy in the top-left corner.
    TopLeft,
    /// Single copy in the top-right corner.
    TopRight,
    /// Single copy in the bottom-left corner.
    BottomLeft,
    /// Single copy in the bottom-right corner.
    #[default]
    BottomRight,
    /// Single copy centered on the canvas.
    Center,
    /// Repeating diagonal pattern over the whole canvas.
    Tiled,
}

impl Position {
    /// All positions, in display order.
    pub const ALL: [Self; 6] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
        Self::Tiled,
    ];

    /// Kebab-case name used in settings and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Center => "center",
            Self::Tiled => "tiled",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::new("position", format!("unknown position {s:?}")))
    }
}

/// How the watermark is sized, rotated and laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementConfig {
    /// Layout strategy.
    pub position: Position,
    /// Watermark width as a fraction of the canvas width, in `(0, 1]`.
    pub scale: f32,
    /// Watermark opacity in `[0, 1]`, baked into the asset at preparation.
    pub opacity: f32,
    /// Distance from the canvas edge for anchored positions, in pixels.
    pub margin: u32,
    /// Space between tiles for the tiled position, in pixels.
    pub gap: u32,
    /// Counter-clockwise rotation in degrees, in `[-180, 180]`.
    pub angle: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self::corner(Position::BottomRight)
    }
}

impl PlacementConfig {
    /// Stock settings for a single anchored watermark.
    #[must_use]
    pub fn corner(position: Position) -> Self {
        Self {
            position,
            scale: 0.15,
            opacity: 1.0,
            margin: 15,
            gap: 0,
            angle: 0.0,
        }
    }

    /// Stock settings for a tiled pattern.
    #[must_use]
    pub fn tiled() -> Self {
        Self {
            position: Position::Tiled,
            scale: 0.15,
            opacity: 0.3,
            margin: 0,
            gap: 30,
            angle: 45.0,
        }
    }

    /// Stock settings for whichever layout `position` selects.
    #[must_use]
    pub fn preset_for(position: Position) -> Self {
        match position {
            Position::Tiled => Self::tiled(),
            anchored => Self::corner(anchored),
        }
    }

    /// Reject values outside their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(ConfigError::new(
                "scale",
                format!("must be within (0, 1], got {}", self.scale),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ConfigError::new(
                "opacity",
                format!("must be within [0, 1], got {}", self.opacity),
            ));
        }
        if !(-180.0..=180.0).contains(&self.angle) {
            return Err(ConfigError::new(
                "angle",
                format!("must be within [-180, 180], got {}", self.angle),
            ));
        }
        Ok(())
    }
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Baseline JPEG; transparency is flattened onto white.
    #[default]
    Jpeg,
    /// Lossless PNG with alpha.
    Png,
    /// Lossy WebP with alpha.
    Webp,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Upper-case format name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WEBP",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(ConfigError::new(
                "output format",
                format!("expected JPEG, PNG or WEBP, got {other:?}"),
            )),
        }
    }
}

/// Export format and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    /// Target format.
    pub format: OutputFormat,
    /// Quality `1..=100`; ignored for PNG.
    pub quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 80,
        }
    }
}

impl OutputSettings {
    /// Reject a quality outside `1..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an out-of-range quality.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::new(
                "quality",
                format!("must be within 1..=100, got {}", self.quality),
            ));
        }
        Ok(())
    }
}

/// Limits enforced on source files before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
    /// Smallest accepted side, in pixels.
    pub min_dimension: u32,
    /// Largest accepted side, in pixels.
    pub max_dimension: u32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            min_dimension: MIN_IMAGE_DIMENSION,
            max_dimension: MAX_IMAGE_DIMENSION,
        }
    }
}

/// Everything the pipeline needs besides the source and the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessOptions {
    /// Resize rules.
    pub resize: ResizeConfig,
    /// Watermark layout.
    pub placement: PlacementConfig,
    /// Export format and quality.
    pub output: OutputSettings,
    /// Source-file limits.
    pub limits: ValidationLimits,
}

impl ProcessOptions {
    /// Validate every nested setting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resize.validate()?;
        self.placement.validate()?;
        self.output.validate()?;
        if self.limits.min_dimension == 0 || self.limits.min_dimension > self.limits.max_dimension
        {
            return Err(ConfigError::new(
                "dimension limits",
                format!(
                    "min {} must be positive and not exceed max {}",
                    self.limits.min_dimension, self.limits.max_dimension
                ),
            ));
        }
        Ok(())
    }
}

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingMode {
    /// Slug of the original name, optionally prefixed.
    #[default]
    KeepOriginal,
    /// `{prefix}_{index:03}` with a fallback prefix of `image`.
    PrefixSequence,
}

/// Output naming rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamingOptions {
    /// Naming strategy.
    pub mode: NamingMode,
    /// Optional prefix, slugged before use.
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_presets_match_layout() {
        let tiled = PlacementConfig::preset_for(Position::Tiled);
        assert_eq!(tiled.position, Position::Tiled);
        assert!((tiled.opacity - 0.3).abs() < f32::EPSILON);
        assert!((tiled.angle - 45.0).abs() < f32::EPSILON);
        assert_eq!(tiled.gap, 30);
        assert_eq!(tiled.margin, 0);

        let corner = PlacementConfig::preset_for(Position::TopLeft);
        assert_eq!(corner.position, Position::TopLeft);
        assert!((corner.opacity - 1.0).abs() < f32::EPSILON);
        assert_eq!(corner.margin, 15);
        assert_eq!(corner.gap, 0);
    }

    #[test]
    fn placement_validation_rejects_out_of_range() {
        assert!(PlacementConfig::default().validate().is_ok());

        let zero_scale = PlacementConfig {
            scale: 0.0,
            ..PlacementConfig::default()
        };
        assert_eq!(zero_scale.validate().unwrap_err().field, "scale");

        let loud = PlacementConfig {
            opacity: 1.5,
            ..PlacementConfig::default()
        };
        assert_eq!(loud.validate().unwrap_err().field, "opacity");

        let spun = PlacementConfig {
            angle: 270.0,
            ..PlacementConfig::default()
        };
        assert_eq!(spun.validate().unwrap_err().field, "angle");
    }

    #[test]
    fn disabled_resize_ignores_value() {
        let cfg = ResizeConfig {
            enabled: false,
            mode: ResizeMode::ExactWidth,
            value: 0,
        };
        assert!(cfg.validate().is_ok());
        assert!(ResizeConfig::new(ResizeMode::ExactWidth, 0)
            .validate()
            .is_err());
    }

    #[test]
    fn quality_bounds() {
        let mut out = OutputSettings::default();
        assert!(out.validate().is_ok());
        out.quality = 0;
        assert!(out.validate().is_err());
        out.quality = 101;
        assert!(out.validate().is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!("Bottom-Right".parse::<Position>().unwrap(), Position::BottomRight);
        assert_eq!("tiled".parse::<Position>().unwrap(), Position::Tiled);
        assert!("middle".parse::<Position>().is_err());

        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("WEBP".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn resize_presets_lookup() {
        assert_eq!(resize_preset("fhd"), Some(1920));
        assert_eq!(resize_preset("4K"), Some(3840));
        assert_eq!(resize_preset("8K"), None);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let opts = ProcessOptions {
            limits: ValidationLimits {
                min_dimension: 500,
                max_dimension: 100,
                ..ValidationLimits::default()
            },
            ..ProcessOptions::default()
        };
        assert_eq!(opts.validate().unwrap_err().field, "dimension limits");
    }
}
