use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use easttext::{draw::draw_text_boxes, DetectionOptions, TextDetectorBuilder};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Detect text regions in an image with the EAST text detector.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the input image.
    #[arg(short, long)]
    image: PathBuf,

    /// Path to the EAST model in ONNX format.
    #[arg(short, long, default_value = "models/frozen_east_text_detection.onnx")]
    model: PathBuf,

    /// Minimum probability for a grid cell to produce a box.
    #[arg(long, default_value_t = 0.5)]
    min_confidence: f32,

    /// Maximum fraction of a box that may be covered by a better one.
    #[arg(long, default_value_t = easttext::DEFAULT_OVERLAP_THRESHOLD)]
    overlap_threshold: f32,

    /// Network input width, a multiple of 32.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Network input height, a multiple of 32.
    #[arg(long, default_value_t = 320)]
    height: u32,

    /// Write a copy of the image with the detected boxes outlined.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let image = image::open(&args.image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;
    let detector = TextDetectorBuilder::new()
        .model(&args.model)
        .input_size(args.width, args.height)
        .build()
        .context("failed to build detector")?;

    let start = Instant::now();
    let boxes = detector.detect(
        &image,
        DetectionOptions {
            min_confidence: args.min_confidence,
            overlap_threshold: args.overlap_threshold,
            ..Default::default()
        },
    )?;
    log::debug!("Text detection took {:?}", start.elapsed());

    for text_box in &boxes {
        let (min, max) = (text_box.rect.min(), text_box.rect.max());
        println!(
            "{:.4}\t{}\t{}\t{}\t{}",
            text_box.score, min.x as i32, min.y as i32, max.x as i32, max.y as i32
        );
    }

    if let Some(output) = &args.output {
        let mut annotated = image.to_rgb8();
        draw_text_boxes(&mut annotated, &boxes);
        annotated
            .save(output)
            .with_context(|| format!("failed to save {}", output.display()))?;
    }

    Ok(())
}
