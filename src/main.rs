//! Command-line driver for the card scanning pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use cardscan::analyze::CardAnalyzer;
use cardscan::core::DetectionConfig;
use cardscan::pipeline::{CardPipeline, PipelineOptions};
use cardscan::prelude::GeminiClient;

/// Detect, crop, and catalog trading cards from scanned sheet images.
#[derive(Parser, Debug)]
#[command(name = "cardscan", version, about)]
struct Args {
    /// Input image files or glob patterns.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Maximum number of cards to find per image.
    #[arg(short = 'n', long, default_value_t = 20)]
    max_rectangles: usize,

    /// Minimum card area in pixels².
    #[arg(short = 'a', long, default_value_t = 500_000.0)]
    min_area: f32,

    /// Write contour overlay and rotation debug artifacts.
    #[arg(short = 'c', long)]
    contours: bool,

    /// Skip the ImageMagick border trim.
    #[arg(long)]
    no_trim: bool,

    /// Root directory for timestamped run output.
    #[arg(long, default_value = "processed")]
    output: PathBuf,

    /// Directory for the content-addressed metadata cache.
    #[arg(long, default_value = "card-data")]
    metadata: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let inputs = expand_inputs(&args.inputs);
    if inputs.is_empty() {
        error!("no input files matched");
        return ExitCode::from(2);
    }

    // Extraction is optional: without a key the pipeline still crops and
    // trims, it just does not catalog.
    let analyzer = match std::env::var("GOOGLE_GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Some(GeminiClient::new(key)),
        _ => {
            warn!("GOOGLE_GEMINI_API_KEY not set, skipping metadata extraction");
            None
        }
    };

    let options = PipelineOptions {
        detection: DetectionConfig {
            min_area: args.min_area,
            max_rectangles: args.max_rectangles,
            ..Default::default()
        },
        output_root: args.output,
        metadata_dir: args.metadata,
        trim: !args.no_trim,
        debug_artifacts: args.contours,
    };

    let pipeline = match CardPipeline::new(
        options,
        analyzer.as_ref().map(|a| a as &dyn CardAnalyzer),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "failed to start pipeline");
            return ExitCode::from(2);
        }
    };

    // Per-image failures are logged by the pipeline and do not change the
    // exit code; only top-level startup errors are fatal.
    let summary = pipeline.run(&inputs);
    println!(
        "{} card(s) from {} image(s) -> {}",
        summary.cards.len(),
        summary.images,
        pipeline.output_dir().display()
    );
    ExitCode::SUCCESS
}

/// Expands glob patterns, keeping input order. Patterns that match nothing
/// are reported and skipped.
fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(entries) => {
                let before = paths.len();
                for entry in entries.flatten() {
                    paths.push(entry);
                }
                if paths.len() == before {
                    warn!(%pattern, "no files matched pattern");
                }
            }
            Err(e) => warn!(%pattern, error = %e, "invalid glob pattern"),
        }
    }
    paths
}
