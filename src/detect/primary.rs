//! Primary detection: external contours of the edge map.

use image::GrayImage;
use imageproc::contours::find_contours;
use tracing::debug;

use crate::core::config::DetectionConfig;
use crate::detect::{Candidate, DetectStrategy, filter_candidates};

/// Extracts card candidates from a binary edge map.
///
/// Only external contours are considered: a card's printed interior produces
/// nested contours that must not compete with the card outline itself. The
/// full `min_area` floor and the narrow primary band apply.
pub fn detect(edge_map: &GrayImage, config: &DetectionConfig) -> Vec<Candidate> {
    let contours = find_contours::<u32>(edge_map);
    debug!(total = contours.len(), "primary pass extracted contours");

    let external = contours.iter().filter(|c| c.parent.is_none());
    let mut candidates = filter_candidates(
        external,
        config.min_area,
        &config.primary_band,
        DetectStrategy::Primary,
    );
    candidates.sort_by(|a, b| {
        b.area
            .partial_cmp(&a.area)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}
