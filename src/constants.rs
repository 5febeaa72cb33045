// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// How often the scan session samples the newest camera frame for decoding.
///
/// QR scanning does not need to run at frame rate; every half second is
/// responsive enough for a handheld code while keeping CPU usage low.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(500);

/// Maximum dimension (in pixels) a frame is downscaled to before decoding.
///
/// Codes held up to a camera are large enough to survive downscaling, and
/// decoding a 640px frame is several times faster than a full-resolution one.
pub const MAX_PROCESS_DIMENSION: u32 = 640;

/// Capacity of the frame channel between the capture thread and consumers.
///
/// When the channel is full the capture thread drops frames instead of
/// blocking; consumers only ever care about the newest frame.
pub const FRAME_CHANNEL_CAPACITY: usize = 10;

/// Number of memory-mapped capture buffers requested from the device.
pub const CAPTURE_BUFFER_COUNT: u32 = 4;

/// Target pixel count when selecting a capture format.
///
/// 640x480 is plenty for both terminal rendering and QR decoding, and low
/// resolutions keep capture latency down.
pub const PREFERRED_CAPTURE_PIXELS: u32 = 640 * 480;

/// Poll timeout for terminal input between redraws.
pub const TERMINAL_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Supported file formats for the still-image decode path
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_interval_reasonable() {
        assert!(SCAN_INTERVAL >= Duration::from_millis(100));
        assert!(SCAN_INTERVAL <= Duration::from_secs(2));
    }

    #[test]
    fn test_image_extension_check() {
        assert!(file_formats::is_image_extension("png"));
        assert!(file_formats::is_image_extension("JPG"));
        assert!(!file_formats::is_image_extension("mp4"));
        assert!(!file_formats::is_image_extension(""));
    }
}
