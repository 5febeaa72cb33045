// SPDX-License-Identifier: GPL-3.0-only

//! QR detection over camera frames
//!
//! Decoding itself is behind the [`FrameDecoder`] seam: grayscale pixels in,
//! decoded symbols out. The production decoder wraps rqrr; tests substitute
//! their own. Everything above the seam is plain orchestration: grayscale
//! conversion, downscaling, and mapping symbol corners back to normalized
//! frame coordinates.

use crate::backends::camera::convert;
use crate::backends::camera::types::CameraFrame;
use crate::constants::MAX_PROCESS_DIMENSION;
use crate::scanner::types::{FrameRegion, QrDetection};
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// One symbol found by a decoder, in processing-image pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    /// Corner points of the symbol (clockwise from top-left)
    pub corners: [(f32, f32); 4],
    /// Decoded payload
    pub content: String,
}

/// The decode seam: raw grayscale pixels in, decoded symbols out
///
/// Implementations must tolerate arbitrary input and return an empty vector
/// on no-match.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, luma: &GrayImage) -> Vec<DecodedSymbol>;
}

/// rqrr-backed decoder
#[derive(Debug, Default)]
pub struct RqrrDecoder;

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, luma: &GrayImage) -> Vec<DecodedSymbol> {
        let mut prepared = rqrr::PreparedImage::prepare(luma.clone());
        let grids = prepared.detect_grids();

        let mut symbols = Vec::with_capacity(grids.len());
        for grid in grids {
            let corners = grid.bounds.map(|point| (point.x as f32, point.y as f32));
            match grid.decode() {
                Ok((_meta, content)) => {
                    symbols.push(DecodedSymbol { corners, content });
                }
                Err(e) => {
                    // A located but unreadable grid is routine (motion blur)
                    trace!(error = %e, "Failed to decode located grid");
                }
            }
        }

        symbols
    }
}

/// QR code detector
///
/// Downscales large frames for speed, converts to grayscale, and runs the
/// decoder. CPU-heavy work happens on a blocking task so the async runtime
/// stays responsive.
pub struct QrDetector {
    max_dimension: u32,
    decoder: Arc<dyn FrameDecoder>,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    /// Create a detector with the default rqrr decoder
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(RqrrDecoder))
    }

    /// Create a detector with a caller-supplied decoder
    pub fn with_decoder(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            max_dimension: MAX_PROCESS_DIMENSION,
            decoder,
        }
    }

    /// Override the processing dimension
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Detect QR codes in a frame without blocking the async runtime
    pub async fn detect(&self, frame: Arc<CameraFrame>) -> Vec<QrDetection> {
        let decoder = Arc::clone(&self.decoder);
        let max_dimension = self.max_dimension;

        tokio::task::spawn_blocking(move || detect_sync(decoder.as_ref(), &frame, max_dimension))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Detection task panicked");
                Vec::new()
            })
    }

    /// Detect QR codes synchronously (CLI still-image path)
    pub fn detect_blocking(&self, frame: &CameraFrame) -> Vec<QrDetection> {
        detect_sync(self.decoder.as_ref(), frame, self.max_dimension)
    }
}

fn detect_sync(
    decoder: &dyn FrameDecoder,
    frame: &CameraFrame,
    max_dimension: u32,
) -> Vec<QrDetection> {
    let start = Instant::now();

    let luma = convert::luma_from_frame(frame);
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    // Downscale large frames; the scale factor maps symbol corners back to
    // original frame coordinates afterwards.
    let scale = (width.max(height) as f32 / max_dimension as f32).max(1.0);
    let luma = if scale > 1.0 {
        let new_width = (width as f32 / scale) as u32;
        let new_height = (height as f32 / scale) as u32;
        imageops::resize(&luma, new_width.max(1), new_height.max(1), FilterType::Triangle)
    } else {
        luma
    };

    let symbols = decoder.decode(&luma);

    let detections: Vec<QrDetection> = symbols
        .into_iter()
        .map(|symbol| {
            let xs = symbol.corners.map(|(x, _)| x * scale);
            let ys = symbol.corners.map(|(_, y)| y * scale);
            let min_x = xs.iter().copied().fold(f32::MAX, f32::min).max(0.0);
            let max_x = xs.iter().copied().fold(f32::MIN, f32::max);
            let min_y = ys.iter().copied().fold(f32::MAX, f32::min).max(0.0);
            let max_y = ys.iter().copied().fold(f32::MIN, f32::max);

            let bounds = FrameRegion::from_pixels(
                min_x,
                min_y,
                (max_x - min_x).max(0.0),
                (max_y - min_y).max(0.0),
                frame.width,
                frame.height,
            );
            QrDetection::new(bounds, symbol.content)
        })
        .collect();

    if detections.is_empty() {
        trace!(elapsed_ms = start.elapsed().as_millis() as u64, "No codes in frame");
    } else {
        debug!(
            count = detections.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detected codes"
        );
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    /// Decoder that reports one fixed symbol regardless of input
    struct FixedDecoder;

    impl FrameDecoder for FixedDecoder {
        fn decode(&self, _luma: &GrayImage) -> Vec<DecodedSymbol> {
            vec![DecodedSymbol {
                corners: [(10.0, 10.0), (30.0, 10.0), (30.0, 30.0), (10.0, 30.0)],
                content: "fixed".into(),
            }]
        }
    }

    fn gray_frame(width: u32, height: u32) -> CameraFrame {
        CameraFrame::packed(
            width,
            height,
            PixelFormat::Gray8,
            vec![128; (width * height) as usize],
        )
    }

    #[test]
    fn test_rqrr_decoder_blank_frame() {
        let detector = QrDetector::new();
        let detections = detector.detect_blocking(&gray_frame(64, 64));
        assert!(detections.is_empty());
    }

    #[test]
    fn test_fake_decoder_bounds_normalized() {
        let detector = QrDetector::with_decoder(Arc::new(FixedDecoder));
        let detections = detector.detect_blocking(&gray_frame(100, 100));
        assert_eq!(detections.len(), 1);
        let bounds = &detections[0].bounds;
        assert!((bounds.x - 0.1).abs() < 0.001);
        assert!((bounds.y - 0.1).abs() < 0.001);
        assert!((bounds.width - 0.2).abs() < 0.001);
        assert!((bounds.height - 0.2).abs() < 0.001);
        assert_eq!(detections[0].content, "fixed");
    }

    #[test]
    fn test_downscaled_bounds_scale_back() {
        // 200x200 frame processed at 100px: corners reported in processing
        // coordinates must be doubled before normalization.
        let detector = QrDetector::with_decoder(Arc::new(FixedDecoder)).with_max_dimension(100);
        let detections = detector.detect_blocking(&gray_frame(200, 200));
        let bounds = &detections[0].bounds;
        assert!((bounds.x - 0.1).abs() < 0.001);
        assert!((bounds.width - 0.2).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_async_detect() {
        let detector = QrDetector::with_decoder(Arc::new(FixedDecoder));
        let detections = detector.detect(Arc::new(gray_frame(50, 50))).await;
        assert_eq!(detections.len(), 1);
    }
}
