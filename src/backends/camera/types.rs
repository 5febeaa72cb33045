// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the camera backend

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Result type alias using BackendError
pub type BackendResult<T> = Result<T, BackendError>;

/// Camera backend errors
#[derive(Debug, Clone)]
pub enum BackendError {
    /// No camera devices found
    NoCameraFound,
    /// Camera initialization failed
    InitializationFailed(String),
    /// Camera disconnected during operation
    Disconnected,
    /// The device offered no format we can convert
    InvalidFormat(String),
    /// Device I/O error
    Io(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NoCameraFound => write!(f, "No camera devices found"),
            BackendError::InitializationFailed(msg) => {
                write!(f, "Initialization failed: {}", msg)
            }
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            BackendError::Io(msg) => write!(f, "Device I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

/// Pixel layout of a [`CameraFrame`]
///
/// Capture-side conversion normalizes exotic device formats, so consumers
/// only ever see one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba,
    /// 8-bit RGB, 3 bytes per pixel
    Rgb24,
    /// 8-bit grayscale, 1 byte per pixel
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single captured frame
///
/// The pixel payload is reference counted so frames can be shared between
/// the display path and the decode path without copying. Rows may carry
/// stride padding; consumers must honor `stride`.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row, including any padding
    pub stride: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Raw pixel data
    pub data: Arc<[u8]>,
    /// When the frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Create a frame with tightly packed rows (stride = width * bpp)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            format,
            data: Arc::from(data),
            captured_at: Instant::now(),
        }
    }

    /// Raw pixel data as a byte slice
    pub fn data_slice(&self) -> &[u8] {
        &self.data
    }
}

/// An enumerated camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human-readable device name (V4L2 card)
    pub name: String,
    /// Device node path (e.g. /dev/video0)
    pub path: PathBuf,
    /// Kernel driver name
    pub driver: String,
}

/// A capture format supported by a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// FourCC code of the device pixel format
    pub fourcc: [u8; 4],
    /// Best available framerate, if the device reports one
    pub framerate: Option<u32>,
}

impl CameraFormat {
    /// FourCC as a printable string
    pub fn fourcc_str(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }
}

impl fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.fourcc_str())?;
        if let Some(fps) = self.framerate {
            write!(f, " @{}fps", fps)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_frame_stride() {
        let frame = CameraFrame::packed(4, 2, PixelFormat::Rgba, vec![0; 32]);
        assert_eq!(frame.stride, 16);
        assert_eq!(frame.data_slice().len(), 32);
    }

    #[test]
    fn test_format_display() {
        let format = CameraFormat {
            width: 640,
            height: 480,
            fourcc: *b"YUYV",
            framerate: Some(30),
        };
        assert_eq!(format.to_string(), "640x480 YUYV @30fps");
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
    }
}
