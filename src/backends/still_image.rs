// SPDX-License-Identifier: GPL-3.0-only

//! Still-image source for the uploaded-file decode path
//!
//! Loads a user-chosen image file into a [`CameraFrame`] so the same
//! detector serves both the live feed and uploaded files.

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::constants::file_formats;
use crate::errors::{ScanError, ScanResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load an image file as a frame
///
/// The extension is checked before touching the pixel data so obviously
/// wrong files (videos, documents) fail with a clear message.
pub fn load_image_as_frame(path: &Path) -> ScanResult<CameraFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(ScanError::Image(format!(
            "unsupported file format: {:?}",
            path.file_name().unwrap_or_default()
        )));
    }

    let img = image::open(path)
        .map_err(|e| ScanError::Image(format!("{}: {}", path.display(), e)))?
        .to_rgba8();

    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "Loaded still image"
    );

    let (width, height) = img.dimensions();
    Ok(CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgba,
        img.into_raw(),
    ))
}

/// Open a native file picker for a still image
///
/// Returns `None` when the user cancels.
pub fn pick_image_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Choose an image with a QR code")
        .add_filter("Images", file_formats::IMAGE_EXTENSIONS)
        .pick_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("white.png");
        let img = image::RgbaImage::from_pixel(8, 6, image::Rgba([255, 255, 255, 255]));
        img.save(&path).unwrap();

        let frame = load_image_as_frame(&path).unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(frame.format, PixelFormat::Rgba);
        assert_eq!(frame.data_slice().len(), 8 * 6 * 4);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let result = load_image_as_frame(Path::new("/tmp/document.pdf"));
        assert!(matches!(result, Err(ScanError::Image(_))));
    }

    #[test]
    fn test_rejects_missing_file() {
        let result = load_image_as_frame(Path::new("/nonexistent/picture.png"));
        assert!(result.is_err());
    }
}
