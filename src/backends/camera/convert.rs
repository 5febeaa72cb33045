// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion for captured frames
//!
//! Devices hand us whatever their driver likes (YUYV, MJPG, ...). Everything
//! is normalized to one of the [`PixelFormat`] variants here, right on the
//! capture thread, so the display and decode paths never deal with device
//! formats.

use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame, PixelFormat};
use image::GrayImage;

/// Build a [`CameraFrame`] from a raw capture buffer.
///
/// `stride` is the device bytesperline for the *source* format; the returned
/// frame is always tightly packed.
pub fn frame_from_capture(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    fourcc: [u8; 4],
) -> BackendResult<CameraFrame> {
    match &fourcc {
        b"YUYV" => {
            let rgba = yuyv_to_rgba(data, width, height, stride);
            Ok(CameraFrame::packed(width, height, PixelFormat::Rgba, rgba))
        }
        b"MJPG" | b"JPEG" => {
            let rgba = mjpg_to_rgba(data)?;
            if rgba.width() != width || rgba.height() != height {
                return Err(BackendError::InvalidFormat(format!(
                    "MJPG frame is {}x{}, expected {}x{}",
                    rgba.width(),
                    rgba.height(),
                    width,
                    height
                )));
            }
            Ok(CameraFrame::packed(
                width,
                height,
                PixelFormat::Rgba,
                rgba.into_raw(),
            ))
        }
        b"RGB3" => Ok(CameraFrame::packed(
            width,
            height,
            PixelFormat::Rgb24,
            strip_stride(data, width, height, stride, 3),
        )),
        b"GREY" => Ok(CameraFrame::packed(
            width,
            height,
            PixelFormat::Gray8,
            strip_stride(data, width, height, stride, 1),
        )),
        other => Err(BackendError::InvalidFormat(format!(
            "unsupported fourcc: {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Whether a device fourcc has a conversion path here
pub fn is_supported_fourcc(fourcc: &[u8; 4]) -> bool {
    matches!(fourcc, b"YUYV" | b"MJPG" | b"JPEG" | b"RGB3" | b"GREY")
}

/// Convert YUYV (YUV 4:2:2) to tightly packed RGBA
///
/// YUYV format: Y0 U Y1 V - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let width = width as usize;
    let height = height as usize;
    let stride = stride as usize;
    let mut rgba = Vec::with_capacity(width * height * 4);

    for row in 0..height {
        let row_start = row * stride;
        let row_end = (row_start + width * 2).min(data.len());
        let row_data = &data[row_start.min(data.len())..row_end];

        let mut emitted = 0;
        for chunk in row_data.chunks_exact(4) {
            let y0 = chunk[0] as f32;
            let u = chunk[1] as f32 - 128.0;
            let y1 = chunk[2] as f32;
            let v = chunk[3] as f32 - 128.0;

            for y in [y0, y1] {
                if emitted >= width {
                    break;
                }
                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
                rgba.extend_from_slice(&[r, g, b, 255]);
                emitted += 1;
            }
        }
        // Short row in a truncated buffer: pad with black
        while emitted < width {
            rgba.extend_from_slice(&[0, 0, 0, 255]);
            emitted += 1;
        }
    }

    rgba
}

/// Decode an MJPG frame via the image crate
fn mjpg_to_rgba(data: &[u8]) -> BackendResult<image::RgbaImage> {
    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map(|img| img.to_rgba8())
        .map_err(|e| BackendError::InvalidFormat(format!("MJPG decode failed: {}", e)))
}

/// Copy frame data row by row, dropping any stride padding
fn strip_stride(data: &[u8], width: u32, height: u32, stride: u32, bpp: u32) -> Vec<u8> {
    let row_bytes = (width * bpp) as usize;
    let stride = stride as usize;
    let mut out = Vec::with_capacity(row_bytes * height as usize);

    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        if end <= data.len() {
            out.extend_from_slice(&data[start..end]);
        } else {
            out.resize(out.len() + row_bytes, 0);
        }
    }

    out
}

/// Convert a frame to a grayscale image for decoding
///
/// Stride padding is skipped. RGB conversion uses the usual BT.601 luma
/// weights.
pub fn luma_from_frame(frame: &CameraFrame) -> GrayImage {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let data = frame.data_slice();
    let mut luma = Vec::with_capacity(width * height);

    for y in 0..height {
        let row = y * stride;
        for x in 0..width {
            let value = match frame.format {
                PixelFormat::Gray8 => data.get(row + x).copied().unwrap_or(0),
                PixelFormat::Rgb24 => luma_at(data, row + x * 3),
                PixelFormat::Rgba => luma_at(data, row + x * 4),
            };
            luma.push(value);
        }
    }

    GrayImage::from_raw(frame.width, frame.height, luma)
        .unwrap_or_else(|| GrayImage::new(frame.width, frame.height))
}

fn luma_at(data: &[u8], idx: usize) -> u8 {
    let r = data.get(idx).copied().unwrap_or(0) as f32;
    let g = data.get(idx + 1).copied().unwrap_or(0) as f32;
    let b = data.get(idx + 2).copied().unwrap_or(0) as f32;
    (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgba_gray_values() {
        // Two pixels, both neutral chroma: Y0=0 (black), Y1=255 (white)
        let data = [0u8, 128, 255, 128];
        let rgba = yuyv_to_rgba(&data, 2, 1, 4);
        assert_eq!(rgba.len(), 8);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_strip_stride_removes_padding() {
        // 2x2 Gray8 with 1 byte of padding per row
        let data = [1u8, 2, 99, 3, 4, 99];
        let out = strip_stride(&data, 2, 2, 3, 1);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_luma_from_rgba_frame() {
        // One red, one white pixel
        let frame = CameraFrame::packed(
            2,
            1,
            PixelFormat::Rgba,
            vec![255, 0, 0, 255, 255, 255, 255, 255],
        );
        let luma = luma_from_frame(&frame);
        assert_eq!(luma.dimensions(), (2, 1));
        assert_eq!(luma.get_pixel(0, 0).0[0], 76); // 0.299 * 255
        assert_eq!(luma.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_luma_honors_stride_padding() {
        // 2x2 Gray8 frame with stride 3
        let mut frame = CameraFrame::packed(2, 2, PixelFormat::Gray8, vec![0; 6]);
        frame.stride = 3;
        frame.data = std::sync::Arc::from(vec![10u8, 20, 99, 30, 40, 99].as_slice());
        let luma = luma_from_frame(&frame);
        assert_eq!(luma.get_pixel(0, 0).0[0], 10);
        assert_eq!(luma.get_pixel(1, 1).0[0], 40);
    }

    #[test]
    fn test_unsupported_fourcc_rejected() {
        let result = frame_from_capture(&[], 2, 2, 4, *b"H264");
        assert!(result.is_err());
        assert!(!is_supported_fourcc(b"H264"));
        assert!(is_supported_fourcc(b"YUYV"));
    }
}
