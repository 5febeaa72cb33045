// SPDX-License-Identifier: GPL-3.0-only

//! qrscan - QR code capture from a live camera feed or a still image
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: camera capture and still-image loading
//! - [`scanner`]: detection over frames and session orchestration
//! - [`terminal`]: the interactive terminal view
//! - [`config`]: user configuration handling
//!
//! Decoding itself is delegated to the [`scanner::FrameDecoder`] seam; the
//! crate orchestrates frame acquisition, interval sampling, and camera
//! lifetime around it.

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod scanner;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use errors::{ScanError, ScanResult};
pub use scanner::{QrAction, QrDetection, QrDetector, ScanEvent, ScanOptions, ScanSession};
