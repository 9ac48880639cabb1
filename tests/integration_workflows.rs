//! End-to-end background replacement workflows
//!
//! Exercises the public API from encoded sources on disk or inline strings
//! through to persisted output, using precomputed masks in place of a model.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use selfie_bgreplace::{
    composite_background, BackgroundFit, CompositeConfig, CompositeProcessor, CompositeRequest,
    CropAnchor, ImageIOService, ImageSink, ImageSource, OutputFormat, OutputTarget,
    PrecomputedMaskProvider, ProcessingStage, ProcessingTimings, ProgressReporter, ProgressUpdate,
    Result,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SUBJECT_RGBA: [u8; 4] = [220, 40, 30, 255];
const BACKGROUND_RGBA: [u8; 4] = [20, 90, 200, 255];

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn write_png(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(image)).unwrap();
    path
}

/// Left half foreground, right half background
fn split_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn read_sink(sink: &ImageSink) -> image::RgbaImage {
    let bytes = match sink {
        ImageSink::File(path) => std::fs::read(path).unwrap(),
        ImageSink::Base64(data) | ImageSink::DataUri(data) => {
            ImageIOService::decode_base64(data).unwrap()
        },
    };
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

#[test]
fn test_file_sources_to_directory_output() -> Result<()> {
    let temp = TempDir::new().unwrap();
    let subject = write_png(temp.path(), "subject.png", &solid(8, 6, SUBJECT_RGBA));
    let background = write_png(temp.path(), "background.png", &solid(16, 12, BACKGROUND_RGBA));
    let mask_path = temp.path().join("mask.png");
    split_mask(8, 6).save(&mask_path).unwrap();

    let output_dir = temp.path().join("out");
    let config = CompositeConfig::builder()
        .output_format(OutputFormat::Png)
        .output_target(OutputTarget::Directory(output_dir.clone()))
        .build()?;

    let sink = composite_background(
        subject.as_path(),
        background.as_path(),
        None,
        Box::new(PrecomputedMaskProvider::from_image_path(&mask_path)),
        &config,
    )?;

    let path = sink.as_path().expect("directory target writes a file");
    assert_eq!(path.parent(), Some(output_dir.as_path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

    let output = read_sink(&sink);
    assert_eq!(output.dimensions(), (8, 6));
    assert_eq!(output.get_pixel(0, 3).0, SUBJECT_RGBA);
    assert_eq!(output.get_pixel(7, 3).0, BACKGROUND_RGBA);
    Ok(())
}

#[test]
fn test_inline_sources_to_data_uri() -> Result<()> {
    let subject = format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png_bytes(&solid(10, 10, SUBJECT_RGBA)))
    );
    let background = STANDARD.encode(png_bytes(&solid(10, 10, BACKGROUND_RGBA)));

    let sink = composite_background(
        subject.as_str(),
        ImageSource::Base64(background),
        None,
        Box::new(PrecomputedMaskProvider::uniform(0.0)),
        &CompositeConfig::default(),
    )?;

    let inline = sink.as_inline().expect("default target is inline");
    assert!(inline.starts_with("data:image/jpeg;base64,"));

    let output = read_sink(&sink);
    assert_eq!(output.dimensions(), (10, 10));
    let pixel = output.get_pixel(5, 5).0;
    for (actual, expected) in pixel.iter().zip(BACKGROUND_RGBA) {
        assert!(actual.abs_diff(expected) <= 3, "{pixel:?}");
    }
    Ok(())
}

#[test]
fn test_bare_base64_strings_are_inline_sources() -> Result<()> {
    let subject = STANDARD.encode(png_bytes(&solid(6, 6, SUBJECT_RGBA)));
    let background = STANDARD.encode(png_bytes(&solid(6, 6, BACKGROUND_RGBA)));
    assert!(matches!(ImageSource::from(subject.as_str()), ImageSource::Base64(_)));

    let config = CompositeConfig::builder()
        .output_format(OutputFormat::Png)
        .output_target(OutputTarget::Base64)
        .build()?;
    let sink = composite_background(
        subject.as_str(),
        background,
        None,
        Box::new(PrecomputedMaskProvider::uniform(1.0)),
        &config,
    )?;

    assert_eq!(read_sink(&sink).get_pixel(3, 3).0, SUBJECT_RGBA);
    Ok(())
}

#[test]
fn test_file_uri_sources() -> Result<()> {
    let temp = TempDir::new().unwrap();
    let subject = write_png(temp.path(), "s.png", &solid(4, 4, SUBJECT_RGBA));
    let background = write_png(temp.path(), "b.png", &solid(4, 4, BACKGROUND_RGBA));
    let output = temp.path().join("result.tiff");

    let config = CompositeConfig::builder()
        .output_format(OutputFormat::Tiff)
        .output_target(OutputTarget::File(output.clone()))
        .build()?;

    let sink = composite_background(
        format!("file://{}", subject.display()),
        format!("file://{}", background.display()),
        None,
        Box::new(PrecomputedMaskProvider::uniform(1.0)),
        &config,
    )?;

    assert_eq!(sink, ImageSink::File(output));
    assert_eq!(read_sink(&sink).get_pixel(2, 2).0, SUBJECT_RGBA);
    Ok(())
}

#[test]
fn test_max_dimension_bounds_both_images() -> Result<()> {
    let mut processor = CompositeProcessor::new(
        CompositeConfig::default(),
        Box::new(PrecomputedMaskProvider::uniform(0.5)),
    )?;

    let request = CompositeRequest::new(
        solid(400, 200, SUBJECT_RGBA),
        solid(600, 600, BACKGROUND_RGBA),
    )
    .with_max_dimension(100);
    let result = processor.process(request)?;

    assert_eq!(result.dimensions(), (100, 50));
    assert_eq!(result.mask.dimensions(), (100, 50));
    assert_eq!(result.metadata.background_dimensions, (100, 100));
    assert_eq!(result.metadata.crop_offset, (0, 25));
    assert_eq!(result.metadata.provider, "uniform");
    Ok(())
}

#[test]
fn test_cover_fit_downscales_background() -> Result<()> {
    let config = CompositeConfig::builder()
        .background_fit(BackgroundFit::Cover)
        .crop_anchor(CropAnchor::Top)
        .build()?;
    let mut processor =
        CompositeProcessor::new(config, Box::new(PrecomputedMaskProvider::uniform(0.0)))?;

    let background = DynamicImage::ImageRgba8(RgbaImage::from_fn(400, 400, |_, y| {
        if y < 200 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    }));
    let result = processor.process(CompositeRequest::new(solid(100, 50, SUBJECT_RGBA), background))?;

    // 400x400 scales to 100x100; the top anchor keeps the white upper half
    assert_eq!(result.dimensions(), (100, 50));
    assert_eq!(result.metadata.crop_offset, (0, 0));
    assert_eq!(result.to_rgba_image().get_pixel(50, 10).0, [255, 255, 255, 255]);
    Ok(())
}

#[test]
fn test_mask_image_resampled_to_subject() -> Result<()> {
    let temp = TempDir::new().unwrap();
    let mask_path = temp.path().join("small_mask.png");
    GrayImage::from_pixel(4, 4, Luma([255])).save(&mask_path).unwrap();

    let provider = PrecomputedMaskProvider::from_image_path(&mask_path).resize_to_subject(true);
    let mut processor = CompositeProcessor::new(CompositeConfig::default(), Box::new(provider))?;

    let result = processor.process(CompositeRequest::new(
        solid(12, 8, SUBJECT_RGBA),
        solid(12, 8, BACKGROUND_RGBA),
    ))?;
    assert_eq!(result.mask.dimensions(), (12, 8));
    assert_eq!(result.to_rgba_image().get_pixel(11, 7).0, SUBJECT_RGBA);
    Ok(())
}

#[derive(Default, Clone)]
struct RecordingReporter {
    stages: Arc<Mutex<Vec<ProcessingStage>>>,
    percentages: Arc<Mutex<Vec<u8>>>,
    completions: Arc<Mutex<Vec<ProcessingTimings>>>,
}

impl ProgressReporter for RecordingReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.stages.lock().unwrap().push(update.stage);
        self.percentages.lock().unwrap().push(update.progress);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        self.completions.lock().unwrap().push(timings);
    }

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

#[test]
fn test_progress_stages_in_order() -> Result<()> {
    let reporter = RecordingReporter::default();
    let config = CompositeConfig::builder()
        .output_format(OutputFormat::Png)
        .output_target(OutputTarget::Base64)
        .build()?;
    let mut processor =
        CompositeProcessor::new(config, Box::new(PrecomputedMaskProvider::uniform(1.0)))?
            .with_progress_reporter(Box::new(reporter.clone()));

    processor.process_to_sink(CompositeRequest::new(
        solid(4, 4, SUBJECT_RGBA),
        solid(4, 4, BACKGROUND_RGBA),
    ))?;

    let stages = reporter.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            ProcessingStage::Initialization,
            ProcessingStage::ImageLoading,
            ProcessingStage::Normalization,
            ProcessingStage::DimensionValidation,
            ProcessingStage::Segmentation,
            ProcessingStage::BackgroundFitting,
            ProcessingStage::Compositing,
            ProcessingStage::Encoding,
            ProcessingStage::Persisting,
            ProcessingStage::Completed,
        ]
    );

    let percentages = reporter.percentages.lock().unwrap().clone();
    assert!(
        percentages.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress went backwards: {percentages:?}"
    );
    assert_eq!(percentages.last(), Some(&100));

    let completions = reporter.completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert!(completions[0].image_encode_ms.is_some());
    Ok(())
}

#[test]
fn test_independent_processors_run_concurrently() {
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            std::thread::spawn(move || {
                let mut processor = CompositeProcessor::new(
                    CompositeConfig::default(),
                    Box::new(PrecomputedMaskProvider::uniform(0.0)),
                )
                .unwrap();
                let background = [i * 10, 0, 0, 255];
                let result = processor
                    .process(CompositeRequest::new(
                        solid(32, 32, SUBJECT_RGBA),
                        solid(64, 64, background),
                    ))
                    .unwrap();
                (background, result.to_rgba_image().get_pixel(16, 16).0)
            })
        })
        .collect();

    for handle in handles {
        let (background, pixel) = handle.join().unwrap();
        assert_eq!(pixel, background);
    }
}
