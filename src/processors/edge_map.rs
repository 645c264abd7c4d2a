//! Edge map construction.
//!
//! Converts a raw color image into a binary, contour-ready edge map:
//! grayscale, Gaussian blur, Canny edge detection, then dilation. The
//! dilation radius is the caller's knob: higher values bridge small gaps in
//! broken card borders but risk merging adjacent cards.

use image::{GrayImage, RgbImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use tracing::debug;

/// Blur sigma equivalent to a 5x5 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;
/// Canny hysteresis thresholds. Fixed; the tunable knob is the dilation.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Builds a binary edge map for contour extraction.
///
/// # Arguments
///
/// * `image` - The source color image.
/// * `dilate_radius` - Dilation radius applied to the Canny output; `0`
///   leaves the raw edges untouched.
///
/// # Returns
///
/// A single-channel image with the same dimensions as the input, white on
/// detected (and dilated) edges, black elsewhere. Pure function of the input
/// raster; deterministic.
pub fn build_edge_map(image: &RgbImage, dilate_radius: u8) -> GrayImage {
    let gray = imageops::grayscale(image);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let edges = canny(&blurred, CANNY_LOW, CANNY_HIGH);
    let edge_map = if dilate_radius > 0 {
        dilate(&edges, Norm::LInf, dilate_radius)
    } else {
        edges
    };
    debug!(
        width = edge_map.width(),
        height = edge_map.height(),
        dilate_radius,
        "built edge map"
    );
    edge_map
}
