// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The host camera capability: enumeration, format negotiation, and a
//! threaded capture pipeline feeding frames into a channel.

pub mod convert;
pub mod types;
pub mod v4l2;

pub use types::{BackendError, BackendResult, CameraDevice, CameraFormat, CameraFrame, PixelFormat};
pub use v4l2::{CameraPipeline, enumerate_cameras, query_formats, select_capture_format};
