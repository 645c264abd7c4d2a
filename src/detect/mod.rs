//! Card rectangle detection.
//!
//! Detection escalates through three strategies until the requested number
//! of candidates is found:
//!
//! 1. [`primary`] - external contours of the dilated Canny edge map, gated
//!    by a narrow aspect band
//! 2. [`morphology`] - global threshold plus a large morphological close,
//!    recovering cards whose border has gaps the edge map cannot bridge
//! 3. [`contour_merge`] - adaptive threshold plus spatial clustering of
//!    small fragments, recovering cards with no continuous border at all
//!
//! Every fallback candidate is tested against all previously accepted boxes
//! with the [`dedup`] overlap predicate before it is admitted.

pub mod contour_merge;
pub mod dedup;
pub mod morphology;
pub mod primary;

use image::{GrayImage, RgbImage, imageops};
use imageproc::contours::Contour;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::{AspectBand, DetectionConfig};
use crate::core::errors::ScanResult;
use crate::processors::edge_map::build_edge_map;
use crate::processors::geometry::{BoundingBox, Point};

/// The strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectStrategy {
    /// Edge-map contour detection.
    Primary,
    /// Morphological-closing fallback.
    Morphology,
    /// Contour-merging fallback.
    ContourMerge,
}

/// A detected rotated rectangle considered a possible card instance.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Area of the fitted 4-point polygon in pixels².
    pub area: f32,
    /// The four corner points of the fitted rectangle.
    pub box_points: [Point; 4],
    /// The strategy that produced this candidate.
    pub strategy: DetectStrategy,
}

/// Result of a detection pass over one image.
pub struct Detection {
    /// Accepted candidates, sorted by area descending.
    pub candidates: Vec<Candidate>,
    /// The binary edge map built for the primary strategy, retained for
    /// debug visualization.
    pub edge_map: GrayImage,
}

/// The three-strategy card rectangle detector.
pub struct CardDetector {
    config: DetectionConfig,
}

impl CardDetector {
    /// Creates a detector after validating the configuration.
    pub fn new(config: DetectionConfig) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Runs the full detection pass over one image.
    ///
    /// Fallback strategies are only invoked while fewer than
    /// `max_rectangles` candidates have been accepted; once the cap is
    /// satisfied the remaining strategies are skipped entirely.
    ///
    /// # Returns
    ///
    /// The accepted candidates sorted by area descending (stable, so equal
    /// areas keep discovery order) and capped at `max_rectangles`, together
    /// with the edge map for debug rendering.
    pub fn detect(&self, image: &RgbImage) -> Detection {
        let cfg = &self.config;
        let edge_map = build_edge_map(image, cfg.edge_dilate_radius);
        let mut candidates = primary::detect(&edge_map, cfg);
        debug!(count = candidates.len(), "primary detection finished");

        if candidates.len() < cfg.max_rectangles {
            let gray = imageops::grayscale(image);

            let recovered = morphology::detect(&gray, cfg, &candidates);
            if !recovered.is_empty() {
                info!(
                    count = recovered.len(),
                    "morphology fallback recovered candidates"
                );
            }
            candidates.extend(recovered);

            if candidates.len() < cfg.max_rectangles {
                let recovered = contour_merge::detect(&gray, cfg, &candidates);
                if !recovered.is_empty() {
                    info!(
                        count = recovered.len(),
                        "contour-merge fallback recovered candidates"
                    );
                }
                candidates.extend(recovered);
            }
        }

        candidates.sort_by(|a, b| {
            b.area
                .partial_cmp(&a.area)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(cfg.max_rectangles);

        Detection {
            candidates,
            edge_map,
        }
    }
}

/// Turns external contours into candidates: area floor, minimum-area
/// rectangle fit, aspect-band gate, 4-point polygon area.
///
/// Shared by all three strategies; each passes its own (relaxed) floor and
/// band.
pub(crate) fn filter_candidates<'a, I>(
    contours: I,
    min_area: f32,
    band: &AspectBand,
    strategy: DetectStrategy,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a Contour<u32>>,
{
    let mut candidates = Vec::new();
    for contour in contours {
        let polygon = BoundingBox::from_contour(contour);
        if polygon.area() < min_area {
            continue;
        }

        let rect = polygon.min_area_rect();
        let ratio = rect.aspect_ratio();
        if !band.contains(ratio) {
            debug!(ratio, ?strategy, "aspect ratio outside band, rejected");
            continue;
        }

        let box_points = rect.box_points();
        // Polygon area of the fitted box, which can differ slightly from the
        // contour area.
        let area = BoundingBox::new(box_points.to_vec()).area();
        candidates.push(Candidate {
            area,
            box_points,
            strategy,
        });
    }
    candidates
}
