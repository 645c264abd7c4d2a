//! Morphological-closing fallback.
//!
//! Recovers cards whose outline the edge map cannot close: a global Otsu
//! threshold separates card from background, then a large morphological
//! close bridges discontinuities the edge dilation could not. The area
//! floor relaxes and the aspect band widens relative to the primary pass.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use tracing::debug;

use crate::core::config::DetectionConfig;
use crate::detect::{Candidate, DetectStrategy, dedup, filter_candidates};

/// Runs the morphology fallback over the grayscale image.
///
/// Candidates overlapping any box in `accepted` (or an earlier acceptance
/// from this same pass) are dropped.
pub fn detect(
    gray: &GrayImage,
    config: &DetectionConfig,
    accepted: &[Candidate],
) -> Vec<Candidate> {
    let binary = binarize(gray);
    let closed = close(&binary, Norm::LInf, config.morph_close_radius);

    let contours = find_contours::<u32>(&closed);
    debug!(total = contours.len(), "morphology pass extracted contours");

    let external = contours.iter().filter(|c| c.parent.is_none());
    let filtered = filter_candidates(
        external,
        config.morph_min_area(),
        &config.morph_band,
        DetectStrategy::Morphology,
    );

    let mut fresh: Vec<Candidate> = Vec::new();
    for candidate in filtered {
        if dedup::overlaps_any(
            &candidate.box_points,
            accepted.iter().chain(&fresh),
            config.overlap_fraction,
        ) {
            continue;
        }
        fresh.push(candidate);
    }
    fresh
}

/// Otsu threshold with automatic polarity.
///
/// The cards must come out white. Whichever side of the Otsu level covers
/// the minority of pixels is taken as foreground, so the pass works for both
/// light-on-dark and dark-on-light scans.
fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let inverted = threshold(gray, level, ThresholdType::BinaryInverted);
    let white = inverted.pixels().filter(|p| p.0[0] > 0).count();
    let total = (inverted.width() * inverted.height()) as usize;
    if white * 2 > total {
        threshold(gray, level, ThresholdType::Binary)
    } else {
        inverted
    }
}
