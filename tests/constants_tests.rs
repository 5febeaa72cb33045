// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for application constants

use qrscan::constants::{
    FRAME_CHANNEL_CAPACITY, MAX_PROCESS_DIMENSION, SCAN_INTERVAL, file_formats,
};
use std::time::Duration;

#[test]
fn test_scan_interval_bounds() {
    assert!(
        SCAN_INTERVAL >= Duration::from_millis(100),
        "Sampling faster than 10Hz wastes CPU on a UI feature"
    );
    assert!(SCAN_INTERVAL <= Duration::from_secs(2), "Scanning must feel live");
}

#[test]
fn test_processing_dimension_sane() {
    assert!(MAX_PROCESS_DIMENSION >= 320);
    assert!(MAX_PROCESS_DIMENSION <= 1920);
}

#[test]
fn test_frame_channel_capacity_nonzero() {
    assert!(FRAME_CHANNEL_CAPACITY > 0);
}

#[test]
fn test_image_extensions() {
    for ext in file_formats::IMAGE_EXTENSIONS {
        assert!(file_formats::is_image_extension(ext));
        assert_eq!(ext, &ext.to_lowercase(), "extensions stored lowercase");
    }
    assert!(!file_formats::is_image_extension("txt"));
}
