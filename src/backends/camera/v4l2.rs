// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Device enumeration, format negotiation, and the capture loop. Frames are
//! converted to a [`PixelFormat`](super::types::PixelFormat) variant on the
//! capture thread and pushed into a bounded channel; when the channel is
//! full, frames are dropped so consumers always see recent data.

use crate::backends::camera::convert;
use crate::backends::camera::types::{
    BackendError, BackendResult, CameraDevice, CameraFormat, CameraFrame,
};
use crate::constants::{CAPTURE_BUFFER_COUNT, PREFERRED_CAPTURE_PIXELS};
use futures::channel::mpsc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// List V4L2 devices that can capture video
pub fn enumerate_cameras() -> BackendResult<Vec<CameraDevice>> {
    let mut cameras = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_path_buf();
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            // Metadata or output node, not a camera
            continue;
        }

        cameras.push(CameraDevice {
            name: node.name().unwrap_or_else(|| caps.card.clone()),
            path,
            driver: caps.driver,
        });
    }

    cameras.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = cameras.len(), "Enumerated capture devices");
    Ok(cameras)
}

/// Query the discrete capture formats a device offers
pub fn query_formats(device: &CameraDevice) -> BackendResult<Vec<CameraFormat>> {
    let dev = Device::with_path(&device.path)?;
    let mut formats = Vec::new();

    for desc in dev.enum_formats()? {
        let Ok(sizes) = dev.enum_framesizes(desc.fourcc) else {
            continue;
        };
        for size in sizes {
            match size.size {
                v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                    let framerate =
                        best_framerate(&dev, desc.fourcc, discrete.width, discrete.height);
                    formats.push(CameraFormat {
                        width: discrete.width,
                        height: discrete.height,
                        fourcc: desc.fourcc.repr,
                        framerate,
                    });
                }
                v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                    // Offer common resolutions within the stepwise range
                    for (width, height) in [(640, 480), (1280, 720)] {
                        if width >= step.min_width
                            && width <= step.max_width
                            && height >= step.min_height
                            && height <= step.max_height
                        {
                            formats.push(CameraFormat {
                                width,
                                height,
                                fourcc: desc.fourcc.repr,
                                framerate: best_framerate(&dev, desc.fourcc, width, height),
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(formats)
}

/// Best discrete framerate the device reports for a resolution
fn best_framerate(dev: &Device, fourcc: FourCC, width: u32, height: u32) -> Option<u32> {
    let intervals = dev.enum_frameintervals(fourcc, width, height).ok()?;
    intervals
        .iter()
        .filter_map(|fi| match &fi.interval {
            v4l::frameinterval::FrameIntervalEnum::Discrete(fraction) => {
                if fraction.numerator == 0 {
                    None
                } else {
                    Some(fraction.denominator / fraction.numerator)
                }
            }
            v4l::frameinterval::FrameIntervalEnum::Stepwise(_) => None,
        })
        .max()
}

/// Pick the capture format best suited for scanning
///
/// Prefers resolutions near 640x480 and formats we can convert; high
/// resolutions only slow down both capture and decode.
pub fn select_capture_format(formats: &[CameraFormat]) -> Option<CameraFormat> {
    formats
        .iter()
        .filter(|f| convert::is_supported_fourcc(&f.fourcc))
        .min_by_key(|f| {
            let pixels = (f.width * f.height) as i64;
            let diff = (pixels - PREFERRED_CAPTURE_PIXELS as i64).abs();
            // Prefer formats that report a framerate
            let fps_penalty = if f.framerate.is_some() { 0 } else { 1_000_000 };
            diff + fps_penalty
        })
        .cloned()
}

/// A running camera capture
///
/// Owns the capture thread; dropping the pipeline stops the thread and
/// releases the device.
pub struct CameraPipeline {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl CameraPipeline {
    /// Open a device, negotiate a format, and start streaming frames into
    /// `sender`.
    pub fn open(
        device: &CameraDevice,
        format: &CameraFormat,
        sender: mpsc::Sender<CameraFrame>,
    ) -> BackendResult<Self> {
        let dev = Device::with_path(&device.path)?;

        let requested = Format::new(format.width, format.height, FourCC::new(&format.fourcc));
        let actual = dev.set_format(&requested)?;

        if !convert::is_supported_fourcc(&actual.fourcc.repr) {
            return Err(BackendError::InvalidFormat(format!(
                "device insists on fourcc {}",
                actual.fourcc
            )));
        }

        info!(
            device = %device.name,
            width = actual.width,
            height = actual.height,
            fourcc = %actual.fourcc,
            "Camera opened"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let name = device.name.clone();
        let thread_name = name.clone();

        let thread = thread::Builder::new()
            .name("qrscan-capture".into())
            .spawn(move || capture_loop(dev, actual, sender, stop_clone, thread_name))
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            stop,
            thread: Some(thread),
            name,
        })
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            // The loop notices the flag after at most one frame interval
            if thread.join().is_err() {
                warn!(device = %self.name, "Capture thread panicked");
            }
        }
        info!(device = %self.name, "Camera released");
    }
}

fn capture_loop(
    dev: Device,
    fmt: Format,
    mut sender: mpsc::Sender<CameraFrame>,
    stop: Arc<AtomicBool>,
    name: String,
) {
    let mut stream =
        match Stream::with_buffers(&dev, Type::VideoCapture, CAPTURE_BUFFER_COUNT) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(device = %name, error = %e, "Failed to map capture buffers");
                return;
            }
        };

    debug!(device = %name, "Capture loop started");

    while !stop.load(Ordering::SeqCst) {
        let (buf, _meta) = match stream.next() {
            Ok(sample) => sample,
            Err(e) => {
                warn!(device = %name, error = %e, "Capture failed, stopping");
                break;
            }
        };

        let frame =
            match convert::frame_from_capture(buf, fmt.width, fmt.height, fmt.stride, fmt.fourcc.repr)
            {
                Ok(frame) => frame,
                Err(e) => {
                    trace!(device = %name, error = %e, "Dropping unconvertible frame");
                    continue;
                }
            };

        match sender.try_send(frame) {
            Ok(()) => {}
            Err(e) if e.is_full() => {
                // Consumer is behind; newest-wins, so just drop this frame
                trace!(device = %name, "Frame channel full, dropping frame");
            }
            Err(_) => {
                debug!(device = %name, "Frame channel closed, stopping capture");
                break;
            }
        }
    }

    debug!(device = %name, "Capture loop exiting");
}
