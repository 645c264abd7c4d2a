//! End-to-end detection tests over synthetic sheet images.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as IPoint;

use cardscan::core::DetectionConfig;
use cardscan::detect::{CardDetector, DetectStrategy, dedup};
use cardscan::processors::geometry::BoundingBox;
use cardscan::processors::normalize_card;

/// Draws a filled rectangle of `w x h` rotated by `theta_deg` about
/// `center`.
fn draw_card(canvas: &mut RgbImage, center: (f32, f32), w: f32, h: f32, theta_deg: f32) {
    let theta = theta_deg.to_radians();
    let (cos, sin) = (theta.cos(), theta.sin());
    let polygon: Vec<IPoint<i32>> = [
        (-w / 2.0, -h / 2.0),
        (w / 2.0, -h / 2.0),
        (w / 2.0, h / 2.0),
        (-w / 2.0, h / 2.0),
    ]
    .iter()
    .map(|(x, y)| {
        IPoint::new(
            (x * cos - y * sin + center.0).round() as i32,
            (x * sin + y * cos + center.1).round() as i32,
        )
    })
    .collect();
    draw_polygon_mut(canvas, &polygon, Rgb([255, 255, 255]));
}

fn within(actual: f32, expected: f32, tolerance: f32) -> bool {
    (actual - expected).abs() / expected <= tolerance
}

#[test]
fn two_cards_on_one_sheet_are_both_found_and_cropped() {
    let mut sheet = RgbImage::from_pixel(3000, 2000, Rgb([0, 0, 0]));
    draw_card(&mut sheet, (800.0, 1000.0), 600.0, 840.0, 10.0);
    draw_card(&mut sheet, (2200.0, 1000.0), 500.0, 700.0, -20.0);

    let config = DetectionConfig {
        min_area: 100_000.0,
        edge_dilate_radius: 2,
        ..Default::default()
    };
    let detector = CardDetector::new(config.clone()).expect("config");
    let detection = detector.detect(&sheet);

    assert_eq!(detection.candidates.len(), 2, "expected exactly two cards");
    // Sorted by area descending: the 600x840 card first.
    assert!(detection.candidates[0].area > detection.candidates[1].area);
    for candidate in &detection.candidates {
        assert_eq!(candidate.strategy, DetectStrategy::Primary);
    }

    let expected = [(600.0f32, 840.0f32), (500.0, 700.0)];
    for (candidate, (exp_w, exp_h)) in detection.candidates.iter().zip(expected) {
        let normalized =
            normalize_card(&sheet, &candidate.box_points, false).expect("normalized crop");
        let crop = normalized.upright;
        assert!(crop.height() > crop.width(), "crop must be portrait");
        assert!(
            within(crop.width() as f32, exp_w, 0.03),
            "width {} vs {exp_w}",
            crop.width()
        );
        assert!(
            within(crop.height() as f32, exp_h, 0.03),
            "height {} vs {exp_h}",
            crop.height()
        );
    }
}

#[test]
fn accepted_candidates_never_overlap() {
    let mut sheet = RgbImage::from_pixel(3000, 2000, Rgb([0, 0, 0]));
    draw_card(&mut sheet, (800.0, 1000.0), 600.0, 840.0, 10.0);
    draw_card(&mut sheet, (2200.0, 1000.0), 500.0, 700.0, -20.0);

    let config = DetectionConfig {
        min_area: 100_000.0,
        edge_dilate_radius: 2,
        ..Default::default()
    };
    let detector = CardDetector::new(config.clone()).expect("config");
    let detection = detector.detect(&sheet);

    for (i, a) in detection.candidates.iter().enumerate() {
        for b in detection.candidates.iter().skip(i + 1) {
            assert!(
                !dedup::boxes_overlap(&a.box_points, &b.box_points, config.overlap_fraction),
                "accepted candidates overlap"
            );
        }
    }
}

/// A card drawn only as a hollow border with gaps: invisible to the primary
/// pass, recovered by the morphological close.
fn draw_broken_border(canvas: &mut RgbImage, x0: i32, y0: i32, w: i32, h: i32) {
    let (x1, y1) = (x0 + w, y0 + h);
    let stroke = 12;
    let (mx, my) = ((x0 + x1) / 2, (y0 + y1) / 2);
    let mut fill = |ax: i32, ay: i32, bx: i32, by: i32| {
        for y in ay..by {
            for x in ax..bx {
                canvas.put_pixel(x as u32, y as u32, Rgb([255, 255, 255]));
            }
        }
    };
    fill(x0, y0, mx - 8, y0 + stroke);
    fill(mx + 8, y0, x1, y0 + stroke);
    fill(x0, y1 - stroke, mx - 8, y1);
    fill(mx + 8, y1 - stroke, x1, y1);
    fill(x0, y0, x0 + stroke, my - 8);
    fill(x0, my + 8, x0 + stroke, y1);
    fill(x1 - stroke, y0, x1, my - 8);
    fill(x1 - stroke, my + 8, x1, y1);
}

#[test]
fn broken_border_escalates_to_morphology_only() {
    let mut sheet = RgbImage::from_pixel(1400, 1400, Rgb([0, 0, 0]));
    draw_broken_border(&mut sheet, 450, 350, 500, 700);

    let config = DetectionConfig {
        min_area: 300_000.0,
        edge_dilate_radius: 0,
        ..Default::default()
    };
    let detector = CardDetector::new(config).expect("config");
    let detection = detector.detect(&sheet);

    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(
        detection.candidates[0].strategy,
        DetectStrategy::Morphology,
        "broken border must be recovered by the morphology fallback"
    );
}

#[test]
fn fragment_only_card_escalates_to_contour_merge() {
    // Printed content with no outline: a dense grid of dark glyph-sized
    // squares on a light sheet.
    let mut sheet = RgbImage::from_pixel(1400, 1400, Rgb([245, 245, 245]));
    for row in 0..17u32 {
        for col in 0..12u32 {
            let x0 = 480 + col * 36;
            let y0 = 380 + row * 36;
            for y in y0..y0 + 20 {
                for x in x0..x0 + 20 {
                    sheet.put_pixel(x, y, Rgb([15, 15, 15]));
                }
            }
        }
    }

    let config = DetectionConfig {
        min_area: 350_000.0,
        edge_dilate_radius: 0,
        ..Default::default()
    };
    let detector = CardDetector::new(config.clone()).expect("config");
    let detection = detector.detect(&sheet);

    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(detection.candidates[0].strategy, DetectStrategy::ContourMerge);
    let rect = BoundingBox::new(detection.candidates[0].box_points.to_vec()).min_area_rect();
    assert!(config.merge_band.contains(rect.aspect_ratio()));
}

#[test]
fn fallbacks_are_skipped_once_the_cap_is_met() {
    let mut sheet = RgbImage::from_pixel(2400, 1400, Rgb([0, 0, 0]));
    // One solid card the primary pass finds, one broken border only the
    // morphology fallback could recover.
    draw_card(&mut sheet, (600.0, 700.0), 500.0, 700.0, 0.0);
    draw_broken_border(&mut sheet, 1500, 350, 500, 700);

    let config = DetectionConfig {
        min_area: 300_000.0,
        max_rectangles: 1,
        edge_dilate_radius: 2,
        ..Default::default()
    };
    let detector = CardDetector::new(config).expect("config");
    let detection = detector.detect(&sheet);

    assert_eq!(detection.candidates.len(), 1);
    assert_eq!(detection.candidates[0].strategy, DetectStrategy::Primary);
}

#[test]
fn blank_sheet_yields_nothing() {
    let sheet = RgbImage::from_pixel(1000, 800, Rgb([128, 128, 128]));
    let detector = CardDetector::new(DetectionConfig::default()).expect("config");
    assert!(detector.detect(&sheet).candidates.is_empty());
}
