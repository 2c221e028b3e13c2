use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use photo_watermarker::{
    plan_batch, prepare_watermark, process_image, run_batch, write_zip, Error, FontCache,
    NamingOptions, OutputFormat, PlacementConfig, Position, ProcessOptions, ResizeConfig,
    ResizeMode, TextWatermark, WatermarkAsset, WatermarkSource,
};

fn white_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
        .save_with_format(&path, ImageFormat::Jpeg)
        .unwrap();
    path
}

fn red_logo_png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[test]
fn resize_only_produces_expected_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let src = white_jpeg(dir.path(), "white.jpg", 800, 600);

    let options = ProcessOptions {
        resize: ResizeConfig::new(ResizeMode::MaxSide, 400),
        ..ProcessOptions::default()
    };
    let result = process_image(&src, "white.jpg", None, &options).unwrap();

    assert_eq!(
        image::guess_format(&result.bytes).unwrap(),
        ImageFormat::Jpeg
    );
    let out = image::load_from_memory(&result.bytes).unwrap();
    assert_eq!((out.width(), out.height()), (400, 300));
    assert_eq!(result.stats.new_resolution, "400x300");
}

#[test]
fn corner_watermark_blends_at_half_opacity() {
    let dir = tempfile::tempdir().unwrap();
    let src = white_jpeg(dir.path(), "white.jpg", 800, 600);

    let placement = PlacementConfig {
        position: Position::BottomRight,
        scale: 0.15,
        margin: 15,
        opacity: 0.5,
        ..PlacementConfig::default()
    };
    let source = WatermarkSource {
        image: Some(red_logo_png()),
        ..WatermarkSource::default()
    };
    let asset = prepare_watermark(&source, placement.opacity, &mut FontCache::new())
        .unwrap()
        .unwrap();

    let options = ProcessOptions {
        resize: ResizeConfig::new(ResizeMode::MaxSide, 400),
        placement,
        ..ProcessOptions::default()
    };
    let result = process_image(&src, "white.jpg", Some(&asset), &options).unwrap();
    let out = image::load_from_memory(&result.bytes).unwrap().to_rgb8();
    assert_eq!(out.dimensions(), (400, 300));

    // 60x30 watermark with its top-left corner at (325, 255).
    let Rgb([r, g, b]) = *out.get_pixel(355, 270);
    assert!(r > 200, "red channel stays high: {r}");
    assert!(g > 80 && g < 180, "green is blended, not pure: {g}");
    assert!(b > 80 && b < 180, "blue is blended, not pure: {b}");

    // Far from the watermark the image stays white.
    let Rgb([r, g, b]) = *out.get_pixel(20, 20);
    assert!(r > 245 && g > 245 && b > 245);
}

#[test]
fn tiled_text_watermark_covers_rotated_canvas() {
    let dir = tempfile::tempdir().unwrap();
    let src = white_jpeg(dir.path(), "tall.jpg", 300, 900);

    let placement = PlacementConfig {
        scale: 0.6,
        opacity: 1.0,
        ..PlacementConfig::preset_for(Position::Tiled)
    };
    let source = WatermarkSource {
        text: Some(TextWatermark {
            color: Rgb([0, 0, 0]),
            size_pt: 40.0,
            ..TextWatermark::new("SAMPLE")
        }),
        ..WatermarkSource::default()
    };
    let asset = prepare_watermark(&source, placement.opacity, &mut FontCache::new())
        .unwrap()
        .unwrap();

    let options = ProcessOptions {
        placement,
        output: photo_watermarker::OutputSettings {
            format: OutputFormat::Png,
            quality: 80,
        },
        ..ProcessOptions::default()
    };
    let result = process_image(&src, "tall.png", Some(&asset), &options).unwrap();
    let out = image::load_from_memory(&result.bytes).unwrap().to_rgb8();
    assert_eq!(out.dimensions(), (300, 900));

    // Every horizontal band of the canvas receives some dark text pixels.
    for band in 0..9 {
        let y0 = band * 100;
        let inked = (y0..y0 + 100)
            .flat_map(|y| (0..300).map(move |x| (x, y)))
            .any(|(x, y)| out.get_pixel(x, y)[0] < 128);
        assert!(inked, "band starting at y={y0} has no watermark");
    }
}

#[test]
fn batch_skips_bad_files_and_zips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let first = white_jpeg(dir.path(), "first.jpg", 120, 80);
    let broken = dir.path().join("broken.jpg");
    std::fs::write(&broken, b"corrupted image data").unwrap();
    let missing = dir.path().join("missing.jpg");
    let second = white_jpeg(dir.path(), "second.jpg", 80, 120);

    let asset = WatermarkAsset::new(RgbaImage::from_pixel(40, 20, Rgba([0, 0, 255, 255])))
        .unwrap()
        .with_opacity(0.7);
    let plan = plan_batch(
        &[first, broken, missing, second],
        &NamingOptions::default(),
        OutputFormat::Jpeg,
    );
    let report = run_batch(&plan, Some(&asset), &ProcessOptions::default()).unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .all(|f| matches!(f.error, Error::Validation(_))));

    let archive = write_zip(Cursor::new(Vec::new()), &report.succeeded).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.into_inner())).unwrap();
    assert_eq!(zip.len(), 2);
    let names: Vec<_> = zip.file_names().map(str::to_string).collect();
    assert!(names.contains(&"first.jpg".to_string()));
    assert!(names.contains(&"second.jpg".to_string()));
    assert!(zip.by_name("first.jpg").unwrap().size() > 0);
}

#[test]
fn blank_text_without_logo_means_no_watermark() {
    let source = WatermarkSource {
        text: Some(TextWatermark::new("   ")),
        image: None,
    };
    let asset = prepare_watermark(&source, 1.0, &mut FontCache::new()).unwrap();
    assert!(asset.is_none());
}
