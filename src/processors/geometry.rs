//! Geometric primitives for card detection.
//!
//! Provides 2D points, point-set polygons, and the minimum-area rotated
//! rectangle fit (convex hull + rotating calipers) that every detection
//! strategy uses to turn a contour into a card candidate.

use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A polygon described by an ordered collection of points.
///
/// Contours, simplified fragments, and 4-point candidate boxes all share this
/// representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The points that define the polygon.
    pub points: Vec<Point>,
}

impl BoundingBox {
    /// Creates a polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates an axis-aligned rectangle from corner coordinates.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            points: vec![
                Point::new(x1, y1),
                Point::new(x2, y1),
                Point::new(x2, y2),
                Point::new(x1, y2),
            ],
        }
    }

    /// Converts an imageproc contour into a polygon.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Polygon area via the shoelace formula. Returns 0.0 for fewer than 3
    /// points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let mut area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }

    /// Polygon perimeter.
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        let mut perimeter = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            let dx = self.points[j].x - self.points[i].x;
            let dy = self.points[j].y - self.points[i].y;
            perimeter += (dx * dx + dy * dy).sqrt();
        }
        perimeter
    }

    /// Axis-aligned bounds of the polygon as `(x_min, y_min, x_max, y_max)`.
    /// Returns `None` for an empty polygon.
    pub fn aabb(&self) -> Option<(f32, f32, f32, f32)> {
        let (x_min, x_max) = self.points.iter().map(|p| p.x).minmax().into_option()?;
        let (y_min, y_max) = self.points.iter().map(|p| p.y).minmax().into_option()?;
        Some((x_min, y_min, x_max, y_max))
    }

    /// Convex hull via Graham's scan. Polygons with fewer than 3 points are
    /// returned unchanged.
    fn convex_hull(&self) -> BoundingBox {
        if self.points.len() < 3 {
            return self.clone();
        }

        let mut points = self.points.clone();

        // Anchor at the lowest point, leftmost on ties.
        let mut start_idx = 0;
        for i in 1..points.len() {
            if points[i].y < points[start_idx].y
                || (points[i].y == points[start_idx].y && points[i].x < points[start_idx].x)
            {
                start_idx = i;
            }
        }
        points.swap(0, start_idx);
        let start = points[0];

        points[1..].sort_by(|a, b| {
            let cross = Self::cross(&start, a, b);
            if cross == 0.0 {
                let dist_a = (a.x - start.x).powi(2) + (a.y - start.y).powi(2);
                let dist_b = (b.x - start.x).powi(2) + (b.y - start.y).powi(2);
                dist_a
                    .partial_cmp(&dist_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
            } else if cross > 0.0 {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::new();
        for point in points {
            while hull.len() > 1
                && Self::cross(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }

        BoundingBox::new(hull)
    }

    fn cross(p1: &Point, p2: &Point, p3: &Point) -> f32 {
        (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
    }

    /// Computes the minimum-area rotated rectangle enclosing the polygon.
    ///
    /// This method uses the rotating calipers algorithm on the convex hull
    /// of the polygon to find the minimum area rectangle.
    ///
    /// # Returns
    ///
    /// A `MinAreaRect` representing the minimum area rectangle. Degenerate
    /// inputs (collinear hull, fewer than 3 points) fall back to the
    /// axis-aligned bounds at angle 0.
    pub fn min_area_rect(&self) -> MinAreaRect {
        let degenerate = |bbox: &BoundingBox| {
            let Some((x_min, y_min, x_max, y_max)) = bbox.aabb() else {
                return MinAreaRect::default();
            };
            MinAreaRect {
                center: Point::new((x_min + x_max) / 2.0, (y_min + y_max) / 2.0),
                width: x_max - x_min,
                height: y_max - y_min,
                angle: 0.0,
            }
        };

        if self.points.len() < 3 {
            return degenerate(self);
        }

        let hull = self.convex_hull();
        let hull_points = &hull.points;
        if hull_points.len() < 3 {
            return degenerate(self);
        }

        let n = hull_points.len();
        let mut min_area = f32::MAX;
        let mut min_rect = MinAreaRect::default();

        for i in 0..n {
            let j = (i + 1) % n;
            let edge_x = hull_points[j].x - hull_points[i].x;
            let edge_y = hull_points[j].y - hull_points[i].y;
            let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
            if edge_len < f32::EPSILON {
                continue;
            }

            // Project every hull point onto the edge direction and its
            // perpendicular.
            let nx = edge_x / edge_len;
            let ny = edge_y / edge_len;
            let px = -ny;
            let py = nx;

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;

            for point in hull_points {
                let rel_x = point.x - hull_points[i].x;
                let rel_y = point.y - hull_points[i].y;
                let proj_n = nx * rel_x + ny * rel_y;
                let proj_p = px * rel_x + py * rel_y;
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;

            if area < min_area {
                min_area = area;
                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;
                min_rect = MinAreaRect {
                    center: Point::new(
                        hull_points[i].x + center_n * nx + center_p * px,
                        hull_points[i].y + center_n * ny + center_p * py,
                    ),
                    width,
                    height,
                    angle: f32::atan2(ny, nx) * 180.0 / PI,
                };
            }
        }

        min_rect
    }

    /// Simplifies the polygon with the Douglas-Peucker algorithm.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - The maximum distance a dropped point may lie from the
    ///   simplified outline.
    ///
    /// # Returns
    ///
    /// A new `BoundingBox` containing only the retained points.
    pub fn approx_poly_dp(&self, epsilon: f32) -> BoundingBox {
        if self.points.len() <= 2 {
            return self.clone();
        }

        let points = &self.points;
        let mut keep = vec![false; points.len()];
        keep[0] = true;
        keep[points.len() - 1] = true;

        let mut stack = vec![(0usize, points.len() - 1)];
        while let Some((start, end)) = stack.pop() {
            if end - start <= 1 {
                continue;
            }

            let mut max_dist = 0.0;
            let mut max_index = start;
            for i in (start + 1)..end {
                let dist = point_to_segment_distance(&points[i], &points[start], &points[end]);
                if dist > max_dist {
                    max_dist = dist;
                    max_index = i;
                }
            }

            if max_dist > epsilon {
                keep[max_index] = true;
                if max_index - start > 1 {
                    stack.push((start, max_index));
                }
                if end - max_index > 1 {
                    stack.push((max_index, end));
                }
            }
        }

        BoundingBox::new(
            points
                .iter()
                .zip(&keep)
                .filter_map(|(p, &k)| k.then_some(*p))
                .collect(),
        )
    }
}

fn point_to_segment_distance(point: &Point, line_start: &Point, line_end: &Point) -> f32 {
    let a = line_end.y - line_start.y;
    let b = line_start.x - line_end.x;
    let c = line_end.x * line_start.y - line_start.x * line_end.y;

    let denominator = (a * a + b * b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (a * point.x + b * point.y + c).abs() / denominator
}

/// A rotated rectangle: the minimum-area enclosure of a point set.
///
/// `angle` is in degrees; increasing angle rotates the box clockwise about
/// `center` in image coordinates (y pointing down).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MinAreaRect {
    /// The center point of the rectangle.
    pub center: Point,
    /// The extent along the rectangle's own x axis.
    pub width: f32,
    /// The extent along the rectangle's own y axis.
    pub height: f32,
    /// The rotation angle in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// The four corner points of the rectangle, in rotation order starting
    /// from the corner at `(-w/2, -h/2)` in the rectangle's own frame.
    pub fn box_points(&self) -> [Point; 4] {
        let cos_a = (self.angle * PI / 180.0).cos();
        let sin_a = (self.angle * PI / 180.0).sin();
        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;

        [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Length of the longer side.
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }

    /// The `shorter-side / longer-side` ratio used to gate card-like shapes.
    /// Returns 0.0 for rectangles with a zero-length side.
    pub fn aspect_ratio(&self) -> f32 {
        let max = self.max_side();
        if self.min_side() <= 0.0 || max <= 0.0 {
            return 0.0;
        }
        self.min_side() / max
    }
}
