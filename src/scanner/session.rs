// SPDX-License-Identifier: GPL-3.0-only

//! Scan session orchestration
//!
//! A [`ScanSession`] samples the newest available frame on a fixed interval,
//! runs detection, and reports [`ScanEvent`]s to the caller. It owns the
//! camera resource for its lifetime: the first accepted result, an explicit
//! [`close`](ScanSession::close), or dropping the session all release it.

use crate::backends::camera::types::CameraFrame;
use crate::constants::SCAN_INTERVAL;
use crate::scanner::detector::QrDetector;
use crate::scanner::types::QrDetection;
use futures::channel::mpsc;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Events reported to the session's caller
#[derive(Debug)]
pub enum ScanEvent {
    /// A code was decoded
    Detected(QrDetection),
    /// The frame source went away (device unplugged, pipeline dropped)
    CameraGone,
    /// The session finished and the camera has been released
    Closed,
}

/// Latest-frame slot between a frame producer and the sampling loop
///
/// Producers overwrite, the session takes. Stale frames are never queued, so
/// a slow decode tick skips frames instead of falling behind.
#[derive(Clone, Default)]
pub struct FrameCell {
    inner: Arc<CellInner>,
}

#[derive(Default)]
struct CellInner {
    frame: Mutex<Option<Arc<CameraFrame>>>,
    gone: AtomicBool,
}

impl FrameCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the newest frame, replacing any unsampled one
    pub fn store(&self, frame: Arc<CameraFrame>) {
        *self.inner.frame.lock().unwrap() = Some(frame);
    }

    /// Take the newest frame, leaving the cell empty
    pub fn take(&self) -> Option<Arc<CameraFrame>> {
        self.inner.frame.lock().unwrap().take()
    }

    /// Mark the frame source as gone
    pub fn mark_gone(&self) {
        self.inner.gone.store(true, Ordering::SeqCst);
    }

    /// Whether the frame source is gone
    pub fn is_gone(&self) -> bool {
        self.inner.gone.load(Ordering::SeqCst)
    }
}

/// Session behavior knobs
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How often to sample and decode
    pub interval: Duration,
    /// Keep scanning after a detection instead of stopping on the first hit
    pub continuous: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            interval: SCAN_INTERVAL,
            continuous: false,
        }
    }
}

/// A running scan session
///
/// Holds the camera resource via an opaque guard; the guard is dropped (and
/// with it the capture pipeline) when the session ends.
pub struct ScanSession {
    stop: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl ScanSession {
    /// Start a session sampling `frames`
    ///
    /// `camera` is whatever owns the frame source; it is dropped when the
    /// session ends. Must be called from within a tokio runtime.
    pub fn start(
        frames: FrameCell,
        camera: Box<dyn Any + Send>,
        detector: QrDetector,
        options: ScanOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events, receiver) = mpsc::unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let task = tokio::spawn(run(frames, camera, detector, options, stop_clone, events));

        (Self { stop, task }, receiver)
    }

    /// Request the session to stop
    ///
    /// The camera is released within one sampling interval; a `Closed` event
    /// follows on the event channel.
    pub fn close(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Aborting drops the task's camera guard immediately
        self.task.abort();
    }
}

async fn run(
    frames: FrameCell,
    camera: Box<dyn Any + Send>,
    detector: QrDetector,
    options: ScanOptions,
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ScanEvent>,
) {
    let mut ticker = time::interval(options.interval);
    // A slow decode tick skips subsequent ticks rather than queueing them
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_content: Option<String> = None;

    debug!(
        interval_ms = options.interval.as_millis() as u64,
        continuous = options.continuous,
        "Scan session started"
    );

    'sampling: loop {
        ticker.tick().await;

        if stop.load(Ordering::SeqCst) {
            break;
        }

        let Some(frame) = frames.take() else {
            if frames.is_gone() {
                info!("Frame source gone, ending session");
                let _ = events.unbounded_send(ScanEvent::CameraGone);
                break;
            }
            continue;
        };

        for detection in detector.detect(frame).await {
            if options.continuous && last_content.as_deref() == Some(detection.content.as_str()) {
                // Same code still in view
                continue;
            }
            last_content = Some(detection.content.clone());

            info!(content = %detection.content, "Code detected");
            let _ = events.unbounded_send(ScanEvent::Detected(detection));

            if !options.continuous {
                break 'sampling;
            }
        }
    }

    // Release the camera before telling the caller we are done
    drop(camera);
    debug!("Scan session closed");
    let _ = events.unbounded_send(ScanEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    fn frame() -> Arc<CameraFrame> {
        Arc::new(CameraFrame::packed(2, 2, PixelFormat::Gray8, vec![0; 4]))
    }

    #[test]
    fn test_frame_cell_latest_wins() {
        let cell = FrameCell::new();
        assert!(cell.take().is_none());

        let first = frame();
        let second = frame();
        cell.store(first);
        cell.store(Arc::clone(&second));

        let taken = cell.take().unwrap();
        assert!(Arc::ptr_eq(&taken, &second));
        assert!(cell.take().is_none(), "take must empty the cell");
    }

    #[test]
    fn test_frame_cell_gone_flag() {
        let cell = FrameCell::new();
        assert!(!cell.is_gone());
        cell.mark_gone();
        assert!(cell.is_gone());
    }
}
