//! Shared helpers: image loading and filename plumbing.

use std::path::Path;

use image::RgbImage;
use tracing::debug;

use crate::core::errors::{ScanError, ScanResult};

/// Loads an image from disk as RGB.
pub fn load_image(path: &Path) -> ScanResult<RgbImage> {
    if !path.is_file() {
        return Err(ScanError::invalid_input(format!(
            "not a readable file: {}",
            path.display()
        )));
    }
    let image = image::open(path).map_err(ScanError::ImageLoad)?;
    let rgb = image.to_rgb8();
    debug!(
        path = %path.display(),
        width = rgb.width(),
        height = rgb.height(),
        "loaded image"
    );
    Ok(rgb)
}

/// MIME type inferred from the file extension. Defaults to JPEG, the
/// dominant scan format.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "image/jpeg",
    }
}

/// Splits a filename into `(stem, extension-with-dot)`, for deriving output
/// names like `scan-cropped-1.png` from `scan.png`.
pub fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a")), "image/jpeg");
    }

    #[test]
    fn test_split_name() {
        let (stem, ext) = split_name(Path::new("/scans/batch-01.png"));
        assert_eq!(stem, "batch-01");
        assert_eq!(ext, ".png");
        let (stem, ext) = split_name(Path::new("noext"));
        assert_eq!(stem, "noext");
        assert_eq!(ext, "");
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(&PathBuf::from("/nonexistent/scan.png")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput { .. }));
    }
}
