//! Batch runner: plan output names, process every file independently, and
//! package the results.
//!
//! A file that fails is recorded in the [`BatchReport`] and the batch moves
//! on; only invalid options stop a run before it starts. With the `parallel`
//! feature, files are processed on the current rayon pool.

use std::collections::HashSet;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{NamingOptions, OutputFormat, ProcessOptions};
use crate::engine::{generate_filename, process_image, ProcessedImage};
use crate::error::{Error, Result};
use crate::validation::is_supported_image;
use crate::watermark::WatermarkAsset;

/// One source file and the name its output will get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Source image path.
    pub source: PathBuf,
    /// Output filename, unique within the batch.
    pub output_name: String,
}

/// A file that could not be processed.
#[derive(Debug)]
pub struct FailedFile {
    /// Source image path.
    pub source: PathBuf,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of a batch run, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files that were processed.
    pub succeeded: Vec<ProcessedImage>,
    /// Files that failed.
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    /// Number of files attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every file succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Assign output names to `sources`.
///
/// Names come from [`generate_filename`] with 1-based indices; a name that
/// is already taken gets `-2`, `-3`, ... appended to its stem.
#[must_use]
pub fn plan_batch(
    sources: &[PathBuf],
    naming: &NamingOptions,
    format: OutputFormat,
) -> Vec<BatchItem> {
    let extension = format.extension();
    let mut taken = HashSet::new();

    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let original = source
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default();
            let name = generate_filename(&original, naming, extension, i + 1);
            let output_name = unique_name(name, extension, &mut taken);
            BatchItem {
                source: source.clone(),
                output_name,
            }
        })
        .collect()
}

fn unique_name(name: String, extension: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let suffix = format!(".{extension}");
    let stem = name.strip_suffix(&suffix).unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{suffix}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Process every item independently.
///
/// # Errors
///
/// Returns [`Error::Config`] if `options` are invalid; no file is touched in
/// that case. Per-file failures are collected in the report instead.
pub fn run_batch(
    items: &[BatchItem],
    watermark: Option<&WatermarkAsset>,
    options: &ProcessOptions,
) -> Result<BatchReport> {
    options.validate()?;
    info!(files = items.len(), watermark = watermark.is_some(), "starting batch");

    let process = |item: &BatchItem| {
        process_image(&item.source, &item.output_name, watermark, options)
            .map_err(|e| (item.source.clone(), e))
    };

    #[cfg(feature = "parallel")]
    let results: Vec<_> = {
        use rayon::prelude::*;
        items.par_iter().map(process).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = items.iter().map(process).collect();

    let mut report = BatchReport::default();
    for result in results {
        match result {
            Ok(processed) => report.succeeded.push(processed),
            Err((source, err)) => {
                error!(source = %source.display(), error = %err, "file failed");
                report.failed.push(FailedFile { source, error: err });
            }
        }
    }

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}

/// Name for an archive holding `count` photos.
#[must_use]
pub fn archive_name(count: usize) -> String {
    format!("watermarked_{count}_photos.zip")
}

/// Write `images` into a deflate-compressed ZIP, one entry per output name.
///
/// # Errors
///
/// Returns [`Error::Archive`] or [`Error::Io`] if writing fails.
pub fn write_zip<W: Write + Seek>(writer: W, images: &[ProcessedImage]) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    for image in images {
        zip.start_file(image.filename(), options)?;
        zip.write_all(&image.bytes)?;
    }
    Ok(zip.finish()?)
}

/// Write each image into `dir` under its output name, creating `dir` first.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory or a file cannot be written.
pub fn save_outputs(dir: &Path, images: &[ProcessedImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    images
        .iter()
        .map(|image| {
            let path = dir.join(image.filename());
            std::fs::write(&path, &image.bytes)?;
            Ok(path)
        })
        .collect()
}

/// Expand command-line inputs into a list of source files.
///
/// Files are kept as given, so unsupported ones surface later as validation
/// failures. Directories contribute their supported images (not recursive),
/// sorted by path.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory cannot be read.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect();
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}
