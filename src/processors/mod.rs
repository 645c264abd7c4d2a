//! Image processing building blocks: geometry primitives, the edge map
//! builder, and the rotation normalizer.

pub mod edge_map;
pub mod geometry;
pub mod normalize;

pub use edge_map::build_edge_map;
pub use geometry::{BoundingBox, MinAreaRect, Point};
pub use normalize::{Normalized, normalize_card};
