// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for scan session orchestration
//!
//! The decoder seam lets these run without a camera or real QR imagery:
//! scripted decoders drive the session, and a drop-flag guard stands in for
//! the capture pipeline to observe camera release.

use futures::StreamExt;
use image::GrayImage;
use qrscan::backends::camera::types::{CameraFrame, PixelFormat};
use qrscan::scanner::{
    DecodedSymbol, FrameCell, FrameDecoder, QrDetector, ScanEvent, ScanOptions, ScanSession,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;

/// Stand-in for the camera pipeline; flips the flag when released
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Decoder that replays a script of payloads, one per call
///
/// Calls beyond the script repeat the last entry; an empty script means
/// no-match forever.
struct ScriptedDecoder {
    script: Vec<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    fn new(script: Vec<&'static str>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn decode(&self, _luma: &GrayImage) -> Vec<DecodedSymbol> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(content) = self
            .script
            .get(call.min(self.script.len().saturating_sub(1)))
        else {
            return Vec::new();
        };
        vec![DecodedSymbol {
            corners: [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            content: content.to_string(),
        }]
    }
}

fn test_frame() -> Arc<CameraFrame> {
    Arc::new(CameraFrame::packed(
        16,
        16,
        PixelFormat::Gray8,
        vec![128; 256],
    ))
}

fn fast_options(continuous: bool) -> ScanOptions {
    ScanOptions {
        interval: Duration::from_millis(10),
        continuous,
    }
}

#[tokio::test]
async fn test_single_shot_detects_and_releases_camera() {
    let released = Arc::new(AtomicBool::new(false));
    let cell = FrameCell::new();
    cell.store(test_frame());

    let detector = QrDetector::with_decoder(Arc::new(ScriptedDecoder::new(vec!["payload"])));
    let (_session, mut events) = ScanSession::start(
        cell,
        Box::new(DropFlag(Arc::clone(&released))),
        detector,
        fast_options(false),
    );

    let first = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("detection within timeout")
        .expect("event");
    match first {
        ScanEvent::Detected(detection) => assert_eq!(detection.content, "payload"),
        other => panic!("expected Detected, got {:?}", other),
    }

    let second = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("closed within timeout")
        .expect("event");
    assert!(matches!(second, ScanEvent::Closed));
    assert!(
        released.load(Ordering::SeqCst),
        "camera must be released once the session closed"
    );
}

#[tokio::test]
async fn test_close_releases_camera_without_detection() {
    let released = Arc::new(AtomicBool::new(false));
    let cell = FrameCell::new();
    cell.store(test_frame());

    // Empty script: never a match
    let detector = QrDetector::with_decoder(Arc::new(ScriptedDecoder::new(vec![])));
    let (session, mut events) = ScanSession::start(
        cell,
        Box::new(DropFlag(Arc::clone(&released))),
        detector,
        fast_options(false),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!released.load(Ordering::SeqCst), "camera held while scanning");

    session.close();
    let event = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("closed within timeout")
        .expect("event");
    assert!(matches!(event, ScanEvent::Closed));
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_dead_frame_source_reports_camera_gone() {
    let cell = FrameCell::new();
    cell.mark_gone();

    let detector = QrDetector::with_decoder(Arc::new(ScriptedDecoder::new(vec!["unused"])));
    let (_session, mut events) = ScanSession::start(
        cell,
        Box::new(()),
        detector,
        fast_options(false),
    );

    let first = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("event within timeout")
        .expect("event");
    assert!(matches!(first, ScanEvent::CameraGone));

    let second = timeout(Duration::from_secs(2), events.next())
        .await
        .expect("event within timeout")
        .expect("event");
    assert!(matches!(second, ScanEvent::Closed));
}

#[tokio::test]
async fn test_continuous_mode_deduplicates_consecutive_payloads() {
    let cell = FrameCell::new();
    let detector =
        QrDetector::with_decoder(Arc::new(ScriptedDecoder::new(vec!["a", "a", "a", "b"])));
    let (session, mut events) = ScanSession::start(
        cell.clone(),
        Box::new(()),
        detector,
        fast_options(true),
    );

    // Keep the cell fed so every tick decodes
    let feeder = tokio::spawn({
        let cell = cell.clone();
        async move {
            loop {
                cell.store(test_frame());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    });

    let mut detected = Vec::new();
    while detected.last().map(String::as_str) != Some("b") {
        let event = timeout(Duration::from_secs(5), events.next())
            .await
            .expect("detection within timeout")
            .expect("event");
        if let ScanEvent::Detected(detection) = event {
            detected.push(detection.content);
        }
    }

    // The repeated "a" frames must have been suppressed
    assert_eq!(detected, vec!["a".to_string(), "b".to_string()]);

    feeder.abort();
    session.close();
}
