//! Overlap deduplication between candidates from different strategies.
//!
//! Fallback strategies re-scan the whole image, so they routinely rediscover
//! cards the primary pass already found. The separating-axis approximation
//! here treats two rotated rectangles as overlapping when their centers are
//! closer than a fraction of their summed half-extents on both axes. It can
//! over-merge nearly touching cards; the factor keeps that rare in practice.

use tracing::debug;

use crate::detect::Candidate;
use crate::processors::geometry::{BoundingBox, Point};

/// Tests two candidate boxes for overlap.
///
/// # Arguments
///
/// * `a` - Corner points of the first box.
/// * `b` - Corner points of the second box.
/// * `fraction` - Fraction of the summed half-extents within which the
///   centers are considered overlapping.
///
/// # Returns
///
/// `true` if the boxes overlap under the center-distance approximation.
pub fn boxes_overlap(a: &[Point; 4], b: &[Point; 4], fraction: f32) -> bool {
    let ra = BoundingBox::new(a.to_vec()).min_area_rect();
    let rb = BoundingBox::new(b.to_vec()).min_area_rect();

    let dx = (ra.center.x - rb.center.x).abs();
    let dy = (ra.center.y - rb.center.y).abs();

    dx < fraction * (ra.width + rb.width) / 2.0 && dy < fraction * (ra.height + rb.height) / 2.0
}

/// Returns true if `points` overlaps any already accepted candidate.
pub fn overlaps_any<'a, I>(points: &[Point; 4], accepted: I, fraction: f32) -> bool
where
    I: IntoIterator<Item = &'a Candidate>,
{
    for existing in accepted {
        if boxes_overlap(points, &existing.box_points, fraction) {
            debug!(strategy = ?existing.strategy, "candidate overlaps accepted box, dropped");
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectStrategy;
    use crate::processors::geometry::MinAreaRect;

    fn boxed(cx: f32, cy: f32, w: f32, h: f32) -> [Point; 4] {
        MinAreaRect {
            center: Point::new(cx, cy),
            width: w,
            height: h,
            angle: 0.0,
        }
        .box_points()
    }

    #[test]
    fn test_identical_boxes_overlap() {
        let a = boxed(100.0, 100.0, 80.0, 110.0);
        assert!(boxes_overlap(&a, &a, 0.7));
    }

    #[test]
    fn test_distant_boxes_do_not_overlap() {
        let a = boxed(100.0, 100.0, 80.0, 110.0);
        let b = boxed(500.0, 100.0, 80.0, 110.0);
        assert!(!boxes_overlap(&a, &b, 0.7));
    }

    #[test]
    fn test_threshold_is_strict() {
        // Centers exactly at 0.7 * (w1 + w2) / 2 apart must not count.
        let a = boxed(0.0, 0.0, 100.0, 100.0);
        let b = boxed(70.0, 0.0, 100.0, 100.0);
        assert!(!boxes_overlap(&a, &b, 0.7));
        let c = boxed(69.0, 0.0, 100.0, 100.0);
        assert!(boxes_overlap(&a, &c, 0.7));
    }

    #[test]
    fn test_overlaps_any_scans_all_accepted() {
        let accepted = vec![
            Candidate {
                area: 1.0,
                box_points: boxed(100.0, 100.0, 50.0, 70.0),
                strategy: DetectStrategy::Primary,
            },
            Candidate {
                area: 1.0,
                box_points: boxed(400.0, 100.0, 50.0, 70.0),
                strategy: DetectStrategy::Primary,
            },
        ];
        let near_second = boxed(405.0, 105.0, 50.0, 70.0);
        assert!(overlaps_any(&near_second, &accepted, 0.7));
        let far = boxed(800.0, 800.0, 50.0, 70.0);
        assert!(!overlaps_any(&far, &accepted, 0.7));
    }
}
