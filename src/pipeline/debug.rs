//! Debug artifact rendering.
//!
//! When enabled, the pipeline writes overlay images next to the crops: raw
//! edge-map contours in red, accepted candidate boxes in green. Invaluable
//! when tuning the dilation radius or the aspect bands against a new scan
//! batch.

use std::path::Path;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::drawing::draw_line_segment_mut;

use crate::core::errors::{ScanError, ScanResult};
use crate::detect::Candidate;

const RAW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ACCEPTED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Writes `<stem>-contours-raw<ext>` and `<stem>-contours-filtered<ext>`.
pub(crate) fn save_contour_artifacts(
    image: &RgbImage,
    edge_map: &GrayImage,
    candidates: &[Candidate],
    out_dir: &Path,
    stem: &str,
    ext: &str,
) -> ScanResult<()> {
    let mut raw = image.clone();
    for contour in find_contours::<u32>(edge_map) {
        for point in &contour.points {
            if point.x < raw.width() && point.y < raw.height() {
                raw.put_pixel(point.x, point.y, RAW_COLOR);
            }
        }
    }
    raw.save(out_dir.join(format!("{stem}-contours-raw{ext}")))
        .map_err(ScanError::ImageSave)?;

    let mut filtered = image.clone();
    for candidate in candidates {
        let corners = &candidate.box_points;
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            draw_line_segment_mut(&mut filtered, (a.x, a.y), (b.x, b.y), ACCEPTED_COLOR);
        }
    }
    filtered
        .save(out_dir.join(format!("{stem}-contours-filtered{ext}")))
        .map_err(ScanError::ImageSave)?;

    Ok(())
}
