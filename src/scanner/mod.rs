// SPDX-License-Identifier: GPL-3.0-only

//! Scanning: detection over frames and session orchestration

pub mod detector;
pub mod session;
pub mod types;

pub use detector::{DecodedSymbol, FrameDecoder, QrDetector, RqrrDecoder};
pub use session::{FrameCell, ScanEvent, ScanOptions, ScanSession};
pub use types::{FrameRegion, QrAction, QrDetection, WifiSecurity};
