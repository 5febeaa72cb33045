// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras and their formats
//! - Decoding a QR code from a still image file

use qrscan::backends::camera::{enumerate_cameras, query_formats};
use qrscan::backends::still_image;
use qrscan::scanner::{QrAction, QrDetector};
use std::path::PathBuf;

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras().unwrap_or_default();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.path.display());

        let formats = query_formats(camera).unwrap_or_default();
        if !formats.is_empty() {
            // Group by resolution, keep the best framerate per resolution
            let mut resolutions: Vec<(u32, u32, u32)> = Vec::new();
            for format in &formats {
                let fps = format.framerate.unwrap_or(30);
                if let Some(existing) = resolutions
                    .iter_mut()
                    .find(|(w, h, _)| *w == format.width && *h == format.height)
                {
                    existing.2 = existing.2.max(fps);
                } else {
                    resolutions.push((format.width, format.height, fps));
                }
            }
            resolutions.sort_by(|a, b| (b.0 * b.1).cmp(&(a.0 * a.1)));

            let res_strs: Vec<String> = resolutions
                .iter()
                .take(3)
                .map(|(w, h, fps)| format!("{}x{}@{}fps", w, h, fps))
                .collect();
            println!("      Formats: {}", res_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Decode a QR code from a still image
///
/// With no path, opens a native file picker.
pub fn decode_image(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path.or_else(still_image::pick_image_file) {
        Some(path) => path,
        None => {
            println!("No image selected.");
            return Ok(());
        }
    };

    let frame = still_image::load_image_as_frame(&path)?;
    println!(
        "Decoding {} ({}x{})",
        path.display(),
        frame.width,
        frame.height
    );

    let detections = QrDetector::new().detect_blocking(&frame);
    if detections.is_empty() {
        println!("No QR code found.");
        return Ok(());
    }

    for detection in &detections {
        println!();
        println!("{}", detection.content);
        match &detection.action {
            QrAction::Url(url) => println!("  -> Link: {}", url),
            QrAction::Wifi { ssid, security, .. } => {
                println!("  -> WiFi network {:?} ({})", ssid, security.display_name())
            }
            QrAction::Phone(number) => println!("  -> Phone: {}", number),
            QrAction::Email { address, .. } => println!("  -> Email: {}", address),
            QrAction::Text(_) => {}
        }
    }

    Ok(())
}
