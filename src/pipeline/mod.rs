//! The end-to-end card scanning pipeline.
//!
//! One run owns a timestamped output directory. Per source image the
//! pipeline detects card rectangles, normalizes each into an upright
//! portrait crop, trims residual background with ImageMagick, and hands the
//! trimmed card to the cataloger. Failures are isolated: a bad image, a
//! degenerate candidate, or a failed trim costs only that unit of work, and
//! the run summary counts what was lost.

mod debug;

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::analyze::CardAnalyzer;
use crate::catalog::{CardRecord, Cataloger};
use crate::core::config::DetectionConfig;
use crate::core::errors::{ScanError, ScanResult};
use crate::detect::{CardDetector, DetectStrategy};
use crate::processors::normalize::normalize_card;
use crate::trim::Trimmer;
use crate::utils::{load_image, split_name};

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Detection thresholds.
    pub detection: DetectionConfig,
    /// Root under which the timestamped run directory is created.
    pub output_root: PathBuf,
    /// Directory holding `<hash>.json` metadata records.
    pub metadata_dir: PathBuf,
    /// Run ImageMagick trim on every crop.
    pub trim: bool,
    /// Write contour overlay and intermediate rotation artifacts.
    pub debug_artifacts: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            output_root: PathBuf::from("processed"),
            metadata_dir: PathBuf::from("card-data"),
            trim: true,
            debug_artifacts: false,
        }
    }
}

/// One card produced by the run.
#[derive(Debug)]
pub struct CroppedCard {
    /// The source image the card was cut from.
    pub source: PathBuf,
    /// The upright crop written into the run directory.
    pub cropped: PathBuf,
    /// The trimmed copy, when trimming ran and succeeded.
    pub trimmed: Option<PathBuf>,
    /// The detection strategy that found this card.
    pub strategy: DetectStrategy,
    /// The cataloged record, when an analyzer was configured and extraction
    /// (or the cache) produced one.
    pub record: Option<CardRecord>,
}

/// Aggregate counts for a run.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    /// Source images processed, including ones that failed.
    pub images: usize,
    /// Every card produced across the run.
    pub cards: Vec<CroppedCard>,
    /// Source images that could not be processed at all.
    pub failures: usize,
    /// Candidates dropped during normalization.
    pub skipped_candidates: usize,
    /// Input paths skipped because they are not regular files.
    pub skipped_inputs: usize,
}

/// The pipeline. Holds the detector, the trimmer, and (optionally) the
/// cataloger for the lifetime of one run directory.
pub struct CardPipeline<'a> {
    detector: CardDetector,
    trimmer: Trimmer,
    cataloger: Option<Cataloger<'a>>,
    options: PipelineOptions,
    output_dir: PathBuf,
    trimmed_dir: PathBuf,
}

impl<'a> CardPipeline<'a> {
    /// Creates the run directory and wires up the stages. `analyzer` is
    /// optional; without one, cards are cropped and trimmed but not
    /// cataloged.
    pub fn new(
        options: PipelineOptions,
        analyzer: Option<&'a dyn CardAnalyzer>,
    ) -> ScanResult<Self> {
        let detector = CardDetector::new(options.detection.clone())?;
        let output_dir = create_output_directory(&options.output_root)?;
        let trimmed_dir = output_dir.join("trimmed");
        std::fs::create_dir_all(&trimmed_dir)?;

        let cataloger = analyzer
            .map(|a| Cataloger::new(a, &options.metadata_dir))
            .transpose()?;

        info!(output_dir = %output_dir.display(), "pipeline run directory created");
        Ok(Self {
            detector,
            trimmer: Trimmer::default(),
            cataloger,
            options,
            output_dir,
            trimmed_dir,
        })
    }

    /// Replaces the trimmer, e.g. for hosts with a renamed ImageMagick
    /// binary.
    pub fn with_trimmer(mut self, trimmer: Trimmer) -> Self {
        self.trimmer = trimmer;
        self
    }

    /// The timestamped run directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Processes a batch, isolating per-image failures.
    pub fn run(&self, inputs: &[PathBuf]) -> ProcessSummary {
        let mut summary = ProcessSummary::default();
        for input in inputs {
            // A directory or dangling path is a skip, not a failure.
            if !input.is_file() {
                warn!(input = %input.display(), "not a regular file, skipping");
                summary.skipped_inputs += 1;
                continue;
            }
            summary.images += 1;
            match self.process_image(input, &mut summary) {
                Ok(count) => info!(input = %input.display(), cards = count, "image processed"),
                Err(e) => {
                    error!(input = %input.display(), error = %e, "image failed");
                    summary.failures += 1;
                }
            }
        }
        info!(
            images = summary.images,
            cards = summary.cards.len(),
            failures = summary.failures,
            skipped_candidates = summary.skipped_candidates,
            skipped_inputs = summary.skipped_inputs,
            "run complete"
        );
        summary
    }

    /// Processes one source image, appending its cards to the summary.
    ///
    /// # Arguments
    ///
    /// * `input` - Path to the source image.
    /// * `summary` - Run summary the produced cards and skip counts are
    ///   recorded into.
    ///
    /// # Returns
    ///
    /// The number of cards produced from this image.
    pub fn process_image(&self, input: &Path, summary: &mut ProcessSummary) -> ScanResult<usize> {
        let image = load_image(input)?;
        let detection = self.detector.detect(&image);
        info!(
            input = %input.display(),
            candidates = detection.candidates.len(),
            "detection finished"
        );

        let (stem, ext) = split_name(input);
        let ext = if ext.is_empty() {
            ".png".to_string()
        } else {
            ext
        };

        if self.options.debug_artifacts {
            debug::save_contour_artifacts(
                &image,
                &detection.edge_map,
                &detection.candidates,
                &self.output_dir,
                &stem,
                &ext,
            )?;
        }

        let mut produced = 0;
        for (index, candidate) in detection.candidates.iter().enumerate() {
            let Some(normalized) =
                normalize_card(&image, &candidate.box_points, self.options.debug_artifacts)
            else {
                summary.skipped_candidates += 1;
                continue;
            };

            let crop_name = format!("{stem}-cropped-{}{ext}", index + 1);
            let mut cropped = self.output_dir.join(&crop_name);
            normalized.upright.save(&cropped).map_err(ScanError::ImageSave)?;

            if let Some(rotated) = normalized.rotated {
                let rotated_path = self
                    .output_dir
                    .join(format!("{stem}-rotated-{}{ext}", index + 1));
                rotated.save(rotated_path).map_err(ScanError::ImageSave)?;
            }
            if let Some(pre_turn) = normalized.pre_turn {
                let debug_path = self
                    .output_dir
                    .join(format!("{stem}-cropped-debug-{}{ext}", index + 1));
                pre_turn.save(debug_path).map_err(ScanError::ImageSave)?;
            }

            let mut trimmed = if self.options.trim {
                let target = self.trimmed_dir.join(&crop_name);
                match self.trimmer.trim(&cropped, &target) {
                    Ok(()) => Some(target),
                    Err(e) => {
                        warn!(card = %cropped.display(), error = %e, "trim failed");
                        None
                    }
                }
            } else {
                None
            };

            // Catalog the trimmed card when there is one; skip cataloging
            // entirely when trimming was requested but failed.
            let catalog_target = match (&trimmed, self.options.trim) {
                (Some(path), _) => Some(path.clone()),
                (None, false) => Some(cropped.clone()),
                (None, true) => None,
            };

            let record = match (&self.cataloger, catalog_target) {
                (Some(cataloger), Some(target)) => match cataloger.catalog(&target) {
                    Ok(outcome) => {
                        // The cataloger may have renamed the file with the
                        // player prefix; keep the paths current.
                        if trimmed.is_some() {
                            trimmed = Some(outcome.path);
                        } else {
                            cropped = outcome.path;
                        }
                        Some(outcome.record)
                    }
                    Err(e) => {
                        warn!(card = %target.display(), error = %e, "cataloging failed");
                        None
                    }
                },
                _ => None,
            };

            summary.cards.push(CroppedCard {
                source: input.to_path_buf(),
                cropped,
                trimmed,
                strategy: candidate.strategy,
                record,
            });
            produced += 1;
        }
        Ok(produced)
    }
}

/// Creates `<root>/<YYYY-MM-DD_HH-MM-SS>/`.
fn create_output_directory(root: &Path) -> ScanResult<PathBuf> {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let dir = root.join(stamp);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
