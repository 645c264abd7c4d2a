//! Rotation normalization.
//!
//! Takes an accepted candidate rectangle and produces an upright, tightly
//! cropped card image: refit the minimum-area rectangle, pad the source so
//! no rotation can clip the card, rotate the padded canvas so the rectangle
//! becomes axis-aligned, crop its bounds, and finish with a fixed quarter
//! turn into portrait orientation.

use image::{Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use tracing::{debug, warn};

use crate::processors::geometry::{BoundingBox, Point};

/// Extra padding beyond the rectangle diagonal, in pixels.
pub const PAD_MARGIN: u32 = 20;

/// Output of a successful normalization.
pub struct Normalized {
    /// The upright, portrait-oriented card crop.
    pub upright: RgbImage,
    /// The full rotated canvas, retained only when debug artifacts were
    /// requested.
    pub rotated: Option<RgbImage>,
    /// The axis-aligned crop before the final quarter turn, retained only
    /// when debug artifacts were requested.
    pub pre_turn: Option<RgbImage>,
}

/// Rotates and crops one candidate rectangle out of the source image.
///
/// The rectangle is refit from the candidate's four box points. Padding of
/// `ceil(diagonal) + PAD_MARGIN` guarantees the card cannot clip against the
/// canvas edge regardless of its original rotation. The final 90° clockwise
/// turn is a fixed convention: after the rectangle fit cards are aligned
/// longer-side-horizontal, so one quarter turn yields portrait orientation.
///
/// # Arguments
///
/// * `image` - The full source image the candidate was detected in.
/// * `box_points` - The candidate's four corner points.
/// * `keep_debug` - Retain the intermediate rotated canvas and pre-turn
///   crop for debug artifacts.
///
/// # Returns
///
/// The normalized crop, or `None` (logged, non-fatal) when the rectangle is
/// degenerate or the crop bounds collapse to an empty region.
pub fn normalize_card(
    image: &RgbImage,
    box_points: &[Point; 4],
    keep_debug: bool,
) -> Option<Normalized> {
    let rect = BoundingBox::new(box_points.to_vec()).min_area_rect();
    if rect.width <= 0.0 || rect.height <= 0.0 {
        warn!(
            width = rect.width,
            height = rect.height,
            "degenerate rectangle, skipping candidate"
        );
        return None;
    }

    // Align the longer side horizontally before the final portrait turn.
    let mut angle = rect.angle;
    if rect.width < rect.height {
        angle += 90.0;
    }

    let diagonal = (rect.width * rect.width + rect.height * rect.height).sqrt();
    let pad = diagonal.ceil() as u32 + PAD_MARGIN;

    let (src_w, src_h) = image.dimensions();
    let mut padded = RgbImage::from_pixel(src_w + 2 * pad, src_h + 2 * pad, Rgb([0, 0, 0]));
    imageops::replace(&mut padded, image, i64::from(pad), i64::from(pad));

    let cx = rect.center.x + pad as f32;
    let cy = rect.center.y + pad as f32;

    // Affine rotation by -angle about the shifted center. The same matrix is
    // applied to the canvas and to the box points, so the cropped bounds stay
    // consistent with the rotated pixels.
    let theta = angle.to_radians();
    let (cos, sin) = (theta.cos(), theta.sin());
    let t0 = cx - (cos * cx + sin * cy);
    let t1 = cy - (-sin * cx + cos * cy);
    let Some(projection) =
        Projection::from_matrix([cos, sin, t0, -sin, cos, t1, 0.0, 0.0, 1.0])
    else {
        warn!(angle, "non-invertible rotation matrix, skipping candidate");
        return None;
    };

    let rotated = warp(&padded, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]));

    let mut x_min = f32::MAX;
    let mut y_min = f32::MAX;
    let mut x_max = f32::MIN;
    let mut y_max = f32::MIN;
    for p in box_points {
        let x = p.x + pad as f32;
        let y = p.y + pad as f32;
        let rx = cos * x + sin * y + t0;
        let ry = -sin * x + cos * y + t1;
        x_min = x_min.min(rx);
        y_min = y_min.min(ry);
        x_max = x_max.max(rx);
        y_max = y_max.max(ry);
    }

    // Clamp against floating-point overshoot at the canvas edges.
    let (rot_w, rot_h) = rotated.dimensions();
    let x_min = (x_min.round().max(0.0) as u32).min(rot_w);
    let y_min = (y_min.round().max(0.0) as u32).min(rot_h);
    let x_max = (x_max.round().max(0.0) as u32).min(rot_w);
    let y_max = (y_max.round().max(0.0) as u32).min(rot_h);

    if x_min >= x_max || y_min >= y_max {
        warn!(
            x_min,
            y_min, x_max, y_max, "empty crop bounds, skipping candidate"
        );
        return None;
    }

    let crop = imageops::crop_imm(&rotated, x_min, y_min, x_max - x_min, y_max - y_min).to_image();
    if crop.width() == 0 || crop.height() == 0 {
        warn!("zero-size crop, skipping candidate");
        return None;
    }

    let upright = imageops::rotate90(&crop);
    debug!(
        width = upright.width(),
        height = upright.height(),
        angle,
        "normalized card crop"
    );

    Some(Normalized {
        upright,
        rotated: keep_debug.then_some(rotated),
        pre_turn: keep_debug.then_some(crop),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as IPoint;

    /// Draws a filled `w x h` rectangle rotated by `theta_deg` about the
    /// canvas center, returning the canvas and the rectangle's corners.
    fn rotated_rect_canvas(w: f32, h: f32, theta_deg: f32) -> (RgbImage, [Point; 4]) {
        let mut canvas = RgbImage::from_pixel(1200, 1200, Rgb([0, 0, 0]));
        let (cx, cy) = (600.0f32, 600.0f32);
        let theta = theta_deg.to_radians();
        let (cos, sin) = (theta.cos(), theta.sin());

        let corners = [
            (-w / 2.0, -h / 2.0),
            (w / 2.0, -h / 2.0),
            (w / 2.0, h / 2.0),
            (-w / 2.0, h / 2.0),
        ]
        .map(|(x, y)| Point::new(x * cos - y * sin + cx, x * sin + y * cos + cy));

        let polygon: Vec<IPoint<i32>> = corners
            .iter()
            .map(|p| IPoint::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        draw_polygon_mut(&mut canvas, &polygon, Rgb([255, 255, 255]));

        (canvas, corners)
    }

    fn assert_portrait_crop(upright: &RgbImage, expected_w: f32, expected_h: f32) {
        let (w, h) = (upright.width() as f32, upright.height() as f32);
        assert!(
            (w - expected_w).abs() / expected_w < 0.03,
            "crop width {w} not within 3% of {expected_w}"
        );
        assert!(
            (h - expected_h).abs() / expected_h < 0.03,
            "crop height {h} not within 3% of {expected_h}"
        );
        let aspect = w.min(h) / w.max(h);
        let expected = expected_w.min(expected_h) / expected_w.max(expected_h);
        assert!(
            (aspect - expected).abs() < 0.02,
            "aspect {aspect} drifted from {expected}"
        );
    }

    fn assert_content_preserved(upright: &RgbImage) {
        // The central half of the crop must be card content, not padding.
        let (w, h) = upright.dimensions();
        let (x0, x1) = (w / 4, 3 * w / 4);
        let (y0, y1) = (h / 4, 3 * h / 4);
        let mut white = 0usize;
        let mut total = 0usize;
        for y in y0..y1 {
            for x in x0..x1 {
                total += 1;
                if upright.get_pixel(x, y).0[0] > 200 {
                    white += 1;
                }
            }
        }
        assert!(
            white as f32 / total as f32 > 0.98,
            "interior content lost: {white}/{total}"
        );
    }

    #[test]
    fn test_round_trip_at_known_angles() {
        for theta in [0.0f32, 15.0, 45.0, 89.0] {
            let (canvas, corners) = rotated_rect_canvas(355.0, 500.0, theta);
            let normalized = normalize_card(&canvas, &corners, false)
                .unwrap_or_else(|| panic!("no crop produced at theta {theta}"));
            assert_portrait_crop(&normalized.upright, 355.0, 500.0);
            assert_content_preserved(&normalized.upright);
        }
    }

    #[test]
    fn test_landscape_input_still_yields_portrait() {
        // Same card, corners supplied from a landscape-first rectangle.
        let (canvas, corners) = rotated_rect_canvas(500.0, 355.0, 10.0);
        let normalized = normalize_card(&canvas, &corners, false).expect("crop");
        assert!(normalized.upright.height() > normalized.upright.width());
        assert_portrait_crop(&normalized.upright, 355.0, 500.0);
    }

    #[test]
    fn test_degenerate_rectangle_is_skipped() {
        let canvas = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let flat = [
            Point::new(10.0, 50.0),
            Point::new(90.0, 50.0),
            Point::new(90.0, 50.0),
            Point::new(10.0, 50.0),
        ];
        assert!(normalize_card(&canvas, &flat, false).is_none());
    }

    #[test]
    fn test_debug_rasters_returned_when_requested() {
        let (canvas, corners) = rotated_rect_canvas(355.0, 500.0, 20.0);
        let normalized = normalize_card(&canvas, &corners, true).expect("crop");
        assert!(normalized.rotated.is_some());
        let pre_turn = normalized.pre_turn.expect("pre-turn crop");
        // The pre-turn crop is the upright crop before its quarter turn.
        assert_eq!(
            (pre_turn.width(), pre_turn.height()),
            (normalized.upright.height(), normalized.upright.width())
        );
    }
}
