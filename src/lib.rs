//! Batch photo watermarking: proportional resize, logo or text watermark,
//! corner or tiled placement, and JPEG/PNG/WebP export.
//!
//! The watermark is prepared once per batch into an immutable
//! [`WatermarkAsset`] (opacity already baked into its alpha). Every source
//! file then runs through [`process_image`] independently: validate, decode
//! upright, resize, composite, encode. [`run_batch`] drives that over many
//! files and collects per-file failures without stopping.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use photo_watermarker::{
//!     plan_batch, prepare_watermark, run_batch, write_zip, FontCache, NamingOptions,
//!     PlacementConfig, Position, ProcessOptions, TextWatermark, WatermarkSource,
//! };
//!
//! let source = WatermarkSource {
//!     text: Some(TextWatermark::new("(c) Example Studio")),
//!     ..WatermarkSource::default()
//! };
//! let placement = PlacementConfig::preset_for(Position::Tiled);
//! let mut fonts = FontCache::new();
//! let asset = prepare_watermark(&source, placement.opacity, &mut fonts)?;
//!
//! let options = ProcessOptions {
//!     placement,
//!     ..ProcessOptions::default()
//! };
//! let inputs = vec![PathBuf::from("a.jpg"), PathBuf::from("b.png")];
//! let plan = plan_batch(&inputs, &NamingOptions::default(), options.output.format);
//! let report = run_batch(&plan, asset.as_ref(), &options)?;
//!
//! let file = std::fs::File::create("watermarked.zip")?;
//! write_zip(file, &report.succeeded)?;
//! # Ok::<(), photo_watermarker::Error>(())
//! ```
//!
//! # Placement
//!
//! Anchored positions paste one copy inside the canvas, clamped so it never
//! leaves the image. [`Position::Tiled`] repeats the watermark in staggered
//! rows that reach every corner, even on very tall or wide canvases.

#![deny(missing_docs)]

pub mod batch;
pub mod config;
pub mod editor;
mod engine;
pub mod error;
pub mod metadata;
pub mod placement;
pub mod resize;
pub mod validation;
pub mod watermark;

pub use batch::{
    archive_name, collect_inputs, plan_batch, run_batch, save_outputs, write_zip, BatchItem,
    BatchReport, FailedFile,
};
pub use config::{
    NamingMode, NamingOptions, OutputFormat, OutputSettings, PlacementConfig, Position,
    ProcessOptions, ResizeConfig, ResizeMode, ValidationLimits,
};
pub use engine::{
    encode_image, flatten_onto_white, generate_filename, process_image, slugify, ProcessedImage,
    ProcessingStats,
};
pub use error::{Error, Result};
pub use placement::apply_watermark;
pub use resize::calculate_resize;
pub use validation::{is_supported_image, validate_image};
pub use watermark::{
    prepare_watermark, FontCache, FontSource, TextWatermark, WatermarkAsset, WatermarkSource,
};
