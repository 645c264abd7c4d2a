//! Detection configuration.
//!
//! Every threshold that gates a candidate is a configuration field rather
//! than a constant: the aspect-ratio bands and area-relaxation factors are
//! empirically tuned per physical card stock and scan setup, and the edge
//! dilation radius is the primary knob for bridging broken card borders
//! without merging adjacent cards.

use serde::{Deserialize, Serialize};

use crate::core::errors::{ScanError, ScanResult};

/// An inclusive range of acceptable `shorter-side / longer-side` ratios.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AspectBand {
    /// Lower bound of the band.
    pub min: f32,
    /// Upper bound of the band.
    pub max: f32,
}

impl AspectBand {
    /// Creates a new aspect band.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns true if the ratio falls inside the band.
    pub fn contains(&self, ratio: f32) -> bool {
        ratio >= self.min && ratio <= self.max
    }
}

/// Configuration for the three-strategy rectangle detector.
///
/// The bands widen and the area floors relax progressively across the
/// fallback strategies: the primary detector is the tightest, the
/// contour-merge fallback the loosest, trading precision for recall only as
/// a last resort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Base minimum contour area in pixels² for a candidate.
    pub min_area: f32,
    /// Maximum number of candidates requested per image.
    pub max_rectangles: usize,
    /// Dilation radius applied to the Canny edge map. Larger values bridge
    /// gaps in broken card borders but risk merging adjacent cards.
    pub edge_dilate_radius: u8,
    /// Aspect band for the primary detector. Narrow enough to reject most
    /// non-card rectangular clutter.
    pub primary_band: AspectBand,

    /// Structuring element radius for the morphological-closing fallback.
    /// Deliberately larger than `edge_dilate_radius` to bridge larger
    /// discontinuities.
    pub morph_close_radius: u8,
    /// Area floor relaxation factor for the morphology fallback.
    pub morph_area_factor: f32,
    /// Widened aspect band for the morphology fallback.
    pub morph_band: AspectBand,

    /// Neighborhood radius for the adaptive threshold in the contour-merge
    /// fallback.
    pub merge_block_radius: u32,
    /// Light dilation radius connecting nearby text/graphic fragments.
    pub merge_dilate_radius: u8,
    /// Minimum fragment contour area in pixels². Very small so tiny text
    /// strokes still count.
    pub merge_fragment_floor: f32,
    /// Spatial grid cell size in pixels for fragment clustering.
    pub merge_cell_size: u32,
    /// Minimum fragments in a cell for it to seed a cluster flood fill.
    pub merge_seed_fragments: usize,
    /// Minimum total fragments for a cluster to be considered a card's worth
    /// of printed content.
    pub merge_min_cluster: usize,
    /// Dilation radius fusing a cluster's rasterized fragments into one mask.
    pub merge_mask_dilate_radius: u8,
    /// Area floor relaxation factor for the contour-merge fallback.
    pub merge_area_factor: f32,
    /// Widest aspect band, used by the contour-merge fallback.
    pub merge_band: AspectBand,

    /// Fraction of summed half-extents used by the overlap deduplicator.
    pub overlap_fraction: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_area: 500_000.0,
            max_rectangles: 20,
            edge_dilate_radius: 8,
            primary_band: AspectBand::new(0.71, 0.72),
            morph_close_radius: 12,
            morph_area_factor: 0.8,
            morph_band: AspectBand::new(0.63, 0.77),
            merge_block_radius: 25,
            merge_dilate_radius: 2,
            merge_fragment_floor: 25.0,
            merge_cell_size: 100,
            merge_seed_fragments: 3,
            merge_min_cluster: 5,
            merge_mask_dilate_radius: 10,
            merge_area_factor: 0.7,
            merge_band: AspectBand::new(0.60, 0.80),
            overlap_fraction: 0.7,
        }
    }
}

impl DetectionConfig {
    /// Validates the configuration, rejecting values that would make the
    /// detector degenerate.
    pub fn validate(&self) -> ScanResult<()> {
        if self.min_area <= 0.0 {
            return Err(ScanError::config("min_area must be positive"));
        }
        if self.max_rectangles == 0 {
            return Err(ScanError::config("max_rectangles must be at least 1"));
        }
        for (name, band) in [
            ("primary_band", &self.primary_band),
            ("morph_band", &self.morph_band),
            ("merge_band", &self.merge_band),
        ] {
            if !(0.0 < band.min && band.min <= band.max && band.max <= 1.0) {
                return Err(ScanError::config(format!(
                    "{name} must satisfy 0 < min <= max <= 1, got [{}, {}]",
                    band.min, band.max
                )));
            }
        }
        for (name, factor) in [
            ("morph_area_factor", self.morph_area_factor),
            ("merge_area_factor", self.merge_area_factor),
        ] {
            if !(0.0 < factor && factor <= 1.0) {
                return Err(ScanError::config(format!(
                    "{name} must be in (0, 1], got {factor}"
                )));
            }
        }
        if self.merge_cell_size == 0 {
            return Err(ScanError::config("merge_cell_size must be positive"));
        }
        if !(0.0 < self.overlap_fraction && self.overlap_fraction <= 1.0) {
            return Err(ScanError::config(format!(
                "overlap_fraction must be in (0, 1], got {}",
                self.overlap_fraction
            )));
        }
        Ok(())
    }

    /// Relaxed area floor for the morphology fallback.
    pub fn morph_min_area(&self) -> f32 {
        self.min_area * self.morph_area_factor
    }

    /// Relaxed area floor for the contour-merge fallback.
    pub fn merge_min_area(&self) -> f32 {
        self.min_area * self.merge_area_factor
    }
}
