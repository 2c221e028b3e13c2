use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use photo_watermarker::config::{
    resize_preset, DEFAULT_TEXT_SIZE_PT, DEFAULT_THREADS, MAX_THREADS, MIN_THREADS,
};
use photo_watermarker::validation::parse_hex_color;
use photo_watermarker::watermark::available_fonts;
use photo_watermarker::{
    archive_name, collect_inputs, plan_batch, prepare_watermark, run_batch, save_outputs,
    write_zip, BatchReport, FontCache, FontSource, NamingMode, NamingOptions, OutputFormat,
    OutputSettings, PlacementConfig, Position, ProcessOptions, ResizeConfig, ResizeMode,
    TextWatermark, WatermarkSource,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResizeModeArg {
    /// Longest side equals the target; never upscales
    MaxSide,
    /// Width equals the target
    ExactWidth,
    /// Height equals the target
    ExactHeight,
}

impl From<ResizeModeArg> for ResizeMode {
    fn from(arg: ResizeModeArg) -> Self {
        match arg {
            ResizeModeArg::MaxSide => Self::MaxSide,
            ResizeModeArg::ExactWidth => Self::ExactWidth,
            ResizeModeArg::ExactHeight => Self::ExactHeight,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamingArg {
    /// Slug of the original name, after the optional prefix
    Keep,
    /// {prefix}_{001}
    Sequence,
}

#[derive(Parser)]
#[command(
    name = "watermarker",
    about = "Resize and watermark photos in bulk",
    version,
    after_help = "Simple usage: watermarker photos/ --text \"(c) Me\" -o out.zip\n\n\
                  An output ending in .zip is written as an archive; anything else is \
                  treated as a directory."
)]
struct Cli {
    /// Input image files or directories
    #[arg(required_unless_present = "list_fonts")]
    inputs: Vec<PathBuf>,

    /// List the .ttf/.otf fonts in a directory and exit
    #[arg(long, value_name = "DIR")]
    list_fonts: Option<PathBuf>,

    /// Output directory or .zip archive (default: watermarked_{N}_photos.zip)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Text watermark (takes priority over --logo)
    #[arg(long)]
    text: Option<String>,

    /// TrueType/OpenType font for the text watermark
    #[arg(long)]
    font: Option<PathBuf>,

    /// Text size in points
    #[arg(long, default_value_t = DEFAULT_TEXT_SIZE_PT)]
    font_size: f32,

    /// Text colour as #RRGGBB
    #[arg(long, default_value = "#FFFFFF")]
    color: String,

    /// Logo image used as the watermark
    #[arg(long)]
    logo: Option<PathBuf>,

    /// top-left, top-right, bottom-left, bottom-right, center or tiled
    #[arg(short, long, default_value = "bottom-right")]
    position: Position,

    /// Watermark width as a percentage of the image width
    #[arg(long)]
    scale: Option<f32>,

    /// Watermark opacity (0.0-1.0)
    #[arg(long)]
    opacity: Option<f32>,

    /// Distance from the edge for corner positions, in pixels
    #[arg(long)]
    margin: Option<u32>,

    /// Space between tiles, in pixels
    #[arg(long)]
    gap: Option<u32>,

    /// Counter-clockwise rotation in degrees (-180 to 180)
    #[arg(long, allow_negative_numbers = true)]
    angle: Option<f32>,

    /// Resize target in pixels, or a preset: HD, FHD, 2K, 4K
    #[arg(long)]
    resize: Option<String>,

    /// Which side the resize target applies to
    #[arg(long, value_enum, default_value_t = ResizeModeArg::MaxSide)]
    resize_mode: ResizeModeArg,

    /// Output format: jpeg, png or webp
    #[arg(short, long, default_value = "jpeg")]
    format: OutputFormat,

    /// Output quality (1-100, ignored for PNG)
    #[arg(long, default_value_t = 80)]
    quality: u8,

    /// How output files are named
    #[arg(long, value_enum, default_value_t = NamingArg::Keep)]
    naming: NamingArg,

    /// Prefix for output names
    #[arg(long, default_value = "")]
    prefix: String,

    /// Worker threads (1-8)
    #[arg(short = 'j', long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Some(dir) = &cli.list_fonts {
        for name in available_fonts(dir) {
            println!("{name}");
        }
        return;
    }

    let options = match build_options(&cli) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let source = match watermark_source(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let mut fonts = FontCache::new();
    let asset = match prepare_watermark(&source, options.placement.opacity, &mut fonts) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    if asset.is_none() && !cli.quiet {
        eprintln!("WARNING: No watermark given, only resizing and converting");
    }

    let inputs = match collect_inputs(&cli.inputs) {
        Ok(i) if i.is_empty() => {
            eprintln!("Error: No supported images found");
            process::exit(1);
        }
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let naming = NamingOptions {
        mode: match cli.naming {
            NamingArg::Keep => NamingMode::KeepOriginal,
            NamingArg::Sequence => NamingMode::PrefixSequence,
        },
        prefix: cli.prefix.clone(),
    };
    let plan = plan_batch(&inputs, &naming, options.output.format);

    let threads = cli.threads.clamp(MIN_THREADS, MAX_THREADS);
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Fatal: Failed to start worker pool: {e}");
            process::exit(1);
        }
    };

    if !cli.quiet {
        eprintln!(
            "Processing {} image(s) with {threads} thread(s), {} at quality {}",
            plan.len(),
            options.output.format,
            options.output.quality
        );
        eprintln!();
    }

    let report = match pool.install(|| run_batch(&plan, asset.as_ref(), &options)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    print_report(&report, cli.verbose, cli.quiet);

    if !report.succeeded.is_empty() {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(archive_name(report.succeeded.len())));
        match write_output(&output, &report) {
            Ok(()) => {
                if !cli.quiet {
                    eprintln!("Saved to {}", output.display());
                }
            }
            Err(e) => {
                eprintln!("Error: Failed to write {}: {e}", output.display());
                process::exit(1);
            }
        }
    }

    if !report.is_complete() {
        process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Position presets fill in every placement flag left unset.
fn build_options(cli: &Cli) -> Result<ProcessOptions, String> {
    let preset = PlacementConfig::preset_for(cli.position);
    let placement = PlacementConfig {
        position: cli.position,
        scale: cli.scale.map_or(preset.scale, |pct| pct / 100.0),
        opacity: cli.opacity.unwrap_or(preset.opacity),
        margin: cli.margin.unwrap_or(preset.margin),
        gap: cli.gap.unwrap_or(preset.gap),
        angle: cli.angle.unwrap_or(preset.angle),
    };

    let resize = match &cli.resize {
        Some(target) => {
            let value = resize_preset(target)
                .or_else(|| target.parse().ok())
                .ok_or_else(|| format!("Invalid resize target: {target}"))?;
            ResizeConfig::new(cli.resize_mode.into(), value)
        }
        None => ResizeConfig::default(),
    };

    let options = ProcessOptions {
        resize,
        placement,
        output: OutputSettings {
            format: cli.format,
            quality: cli.quality,
        },
        ..ProcessOptions::default()
    };
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

fn watermark_source(cli: &Cli) -> Result<WatermarkSource, String> {
    let text = match &cli.text {
        Some(text) => Some(TextWatermark {
            text: text.clone(),
            font: cli
                .font
                .clone()
                .map_or(FontSource::Default, FontSource::Path),
            size_pt: cli.font_size,
            color: parse_hex_color(&cli.color).map_err(|e| e.to_string())?,
        }),
        None => None,
    };

    let image = match &cli.logo {
        Some(path) => Some(
            std::fs::read(path)
                .map_err(|e| format!("Failed to read logo {}: {e}", path.display()))?,
        ),
        None => None,
    };

    Ok(WatermarkSource { text, image })
}

fn write_output(output: &Path, report: &BatchReport) -> photo_watermarker::Result<()> {
    let is_zip = output
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if is_zip {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_zip(File::create(output)?, &report.succeeded)?;
    } else {
        save_outputs(output, &report.succeeded)?;
    }
    Ok(())
}

fn print_report(report: &BatchReport, verbose: bool, quiet: bool) {
    for processed in &report.succeeded {
        if quiet {
            continue;
        }
        let stats = &processed.stats;
        eprintln!(
            "[OK] {} ({} -> {}, {})",
            stats.filename, stats.original_resolution, stats.new_resolution, stats.scale_factor
        );
        if verbose {
            eprintln!("  -> {stats}");
        }
    }

    for failed in &report.failed {
        let filename = failed.source.file_name().map_or_else(
            || failed.source.display().to_string(),
            |f| f.to_string_lossy().to_string(),
        );
        eprintln!("[FAIL] {filename}: {}", failed.error);
    }

    if report.total() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Processed: {}", report.succeeded.len());
        if !report.failed.is_empty() {
            eprint!(", Failed: {}", report.failed.len());
        }
        eprintln!(" (Total: {})", report.total());
    }
}
