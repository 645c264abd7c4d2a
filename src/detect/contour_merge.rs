//! Contour-merging fallback.
//!
//! The last resort for cards with no usable outline at all: an adaptive
//! threshold pulls out the card's printed content as many small fragments,
//! the fragments are clustered on a coarse spatial grid, and each dense
//! cluster is fused into a single mask whose outline is fitted like any
//! other candidate. The widest aspect band and the lowest area floor apply.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use image::{GrayImage, Luma, imageops};
use imageproc::contours::find_contours;
use imageproc::contrast::adaptive_threshold;
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::morphology::dilate;
use imageproc::rect::Rect;
use tracing::debug;

use crate::core::config::DetectionConfig;
use crate::detect::{Candidate, DetectStrategy, dedup, filter_candidates};
use crate::processors::geometry::BoundingBox;

type Cell = (i64, i64);

/// Runs the contour-merge fallback over the grayscale image.
pub fn detect(
    gray: &GrayImage,
    config: &DetectionConfig,
    accepted: &[Candidate],
) -> Vec<Candidate> {
    let fragments = extract_fragments(gray, config);
    debug!(count = fragments.len(), "contour-merge extracted fragments");
    if fragments.is_empty() {
        return Vec::new();
    }

    let clusters = cluster_fragments(&fragments, config);
    debug!(count = clusters.len(), "contour-merge formed clusters");

    let (width, height) = gray.dimensions();
    let mut fresh: Vec<Candidate> = Vec::new();
    for cluster in clusters {
        let mask = rasterize_cluster(&fragments, &cluster, width, height);
        let fused = dilate(&mask, Norm::LInf, config.merge_mask_dilate_radius);

        let contours = find_contours::<u32>(&fused);
        let external = contours.iter().filter(|c| c.parent.is_none());
        let candidates = filter_candidates(
            external,
            config.merge_min_area(),
            &config.merge_band,
            DetectStrategy::ContourMerge,
        );

        for candidate in candidates {
            if dedup::overlaps_any(
                &candidate.box_points,
                accepted.iter().chain(&fresh),
                config.overlap_fraction,
            ) {
                continue;
            }
            fresh.push(candidate);
        }
    }
    fresh
}

/// Adaptive threshold, inversion, light dilation, then every contour above
/// the fragment floor simplified with Douglas-Peucker at 1% of its
/// perimeter.
fn extract_fragments(gray: &GrayImage, config: &DetectionConfig) -> Vec<BoundingBox> {
    let mut binary = adaptive_threshold(gray, config.merge_block_radius);
    // Printed content is darker than its neighborhood; flip it to foreground.
    imageops::invert(&mut binary);
    let connected = if config.merge_dilate_radius > 0 {
        dilate(&binary, Norm::LInf, config.merge_dilate_radius)
    } else {
        binary
    };

    // All contours, not just external: nested text strokes count too.
    let contours = find_contours::<u32>(&connected);
    let mut fragments = Vec::new();
    for contour in &contours {
        let polygon = BoundingBox::from_contour(contour);
        if polygon.area() < config.merge_fragment_floor {
            continue;
        }
        let epsilon = 0.01 * polygon.perimeter();
        fragments.push(polygon.approx_poly_dp(epsilon));
    }
    fragments
}

/// Buckets fragments into a coarse grid by their bounding-box center, then
/// flood-fills 8-connected occupied cells starting from each cell holding at
/// least `merge_seed_fragments`. Clusters below `merge_min_cluster` total
/// fragments are discarded.
fn cluster_fragments(fragments: &[BoundingBox], config: &DetectionConfig) -> Vec<Vec<usize>> {
    let cell_size = config.merge_cell_size as f32;
    let mut grid: BTreeMap<Cell, Vec<usize>> = BTreeMap::new();
    for (index, fragment) in fragments.iter().enumerate() {
        let Some((x0, y0, x1, y1)) = fragment.aabb() else {
            continue;
        };
        let cell = (
            (((x0 + x1) / 2.0) / cell_size).floor() as i64,
            (((y0 + y1) / 2.0) / cell_size).floor() as i64,
        );
        grid.entry(cell).or_default().push(index);
    }

    let mut visited: std::collections::BTreeSet<Cell> = std::collections::BTreeSet::new();
    let mut clusters = Vec::new();
    for (&seed, members) in &grid {
        if members.len() < config.merge_seed_fragments || visited.contains(&seed) {
            continue;
        }

        let mut cluster = Vec::new();
        let mut queue = VecDeque::from([seed]);
        visited.insert(seed);
        while let Some(cell) = queue.pop_front() {
            cluster.extend_from_slice(&grid[&cell]);
            for dx in -1..=1i64 {
                for dy in -1..=1i64 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let neighbor = (cell.0 + dx, cell.1 + dy);
                    if grid.contains_key(&neighbor) && visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        if cluster.len() >= config.merge_min_cluster {
            clusters.push(cluster);
        }
    }
    clusters
}

/// Paints the axis-aligned bounds of every fragment in the cluster onto a
/// blank mask.
fn rasterize_cluster(
    fragments: &[BoundingBox],
    cluster: &[usize],
    width: u32,
    height: u32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &index in cluster {
        let Some((x0, y0, x1, y1)) = fragments[index].aabb() else {
            continue;
        };
        let x = (x0.floor().max(0.0) as i32).min(width.saturating_sub(1) as i32);
        let y = (y0.floor().max(0.0) as i32).min(height.saturating_sub(1) as i32);
        let w = ((x1.ceil() - x0.floor()).max(1.0) as u32).min(width - x as u32);
        let h = ((y1.ceil() - y0.floor()).max(1.0) as u32).min(height - y as u32);
        draw_filled_rect_mut(&mut mask, Rect::at(x, y).of_size(w, h), Luma([255]));
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A grid of small dark squares on white: the printed content of a card
    /// with no detectable outline. 12x17 squares of 20px at a 36px pitch
    /// span roughly 416x596; the radius-10 mask dilation fuses them into one
    /// region near card aspect.
    fn fragment_grid_canvas() -> GrayImage {
        let mut canvas = GrayImage::from_pixel(1400, 1400, Luma([245]));
        let (origin_x, origin_y) = (480u32, 380u32);
        for row in 0..17u32 {
            for col in 0..12u32 {
                let x0 = origin_x + col * 36;
                let y0 = origin_y + row * 36;
                for y in y0..y0 + 20 {
                    for x in x0..x0 + 20 {
                        canvas.put_pixel(x, y, Luma([15]));
                    }
                }
            }
        }
        canvas
    }

    #[test]
    fn test_fragment_grid_forms_single_candidate() {
        let gray = fragment_grid_canvas();
        let config = DetectionConfig {
            min_area: 350_000.0,
            ..Default::default()
        };
        let candidates = detect(&gray, &config, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].strategy, DetectStrategy::ContourMerge);
        let rect = BoundingBox::new(candidates[0].box_points.to_vec()).min_area_rect();
        assert!(config.merge_band.contains(rect.aspect_ratio()));
    }

    #[test]
    fn test_sparse_fragments_form_no_cluster() {
        // Four isolated squares, one per distant grid cell: no cell reaches
        // the seed count.
        let mut canvas = GrayImage::from_pixel(1400, 1400, Luma([245]));
        for &(x0, y0) in &[(200u32, 200u32), (900, 200), (200, 900), (900, 900)] {
            for y in y0..y0 + 20 {
                for x in x0..x0 + 20 {
                    canvas.put_pixel(x, y, Luma([15]));
                }
            }
        }
        let config = DetectionConfig {
            min_area: 100_000.0,
            ..Default::default()
        };
        assert!(detect(&canvas, &config, &[]).is_empty());
    }

    #[test]
    fn test_cluster_flood_fill_joins_neighboring_cells() {
        // Fragments centered in two horizontally adjacent cells, three each:
        // both seed, flood fill must merge them into one cluster.
        let fragments: Vec<BoundingBox> = [
            (40.0, 40.0),
            (50.0, 50.0),
            (60.0, 60.0),
            (140.0, 40.0),
            (150.0, 50.0),
            (160.0, 60.0),
        ]
        .iter()
        .map(|&(x, y)| BoundingBox::from_coords(x, y, x + 10.0, y + 10.0))
        .collect();
        let config = DetectionConfig {
            merge_min_cluster: 5,
            ..Default::default()
        };
        let clusters = cluster_fragments(&fragments, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 6);
    }
}
