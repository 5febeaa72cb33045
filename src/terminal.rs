// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scan view
//!
//! Renders the live camera feed with Unicode half-block characters, overlays
//! detection bounds, and drives a [`ScanSession`]. The session owns the
//! capture pipeline, so a successful scan releases the camera while the view
//! keeps showing the frozen last frame and the result.

use crate::backends::camera::types::{CameraDevice, CameraFrame, PixelFormat};
use crate::backends::camera::{
    CameraPipeline, enumerate_cameras, query_formats, select_capture_format,
};
use crate::config::Config;
use crate::constants::{FRAME_CHANNEL_CAPACITY, TERMINAL_POLL_INTERVAL};
use crate::errors::{ScanError, ScanResult};
use crate::scanner::{
    FrameCell, FrameRegion, QrAction, QrDetection, QrDetector, ScanEvent, ScanOptions, ScanSession,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::mpsc;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use tracing::{error, info};

/// Run the terminal scan view
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Everything belonging to one scan attempt
struct ActiveScan {
    frames: mpsc::Receiver<CameraFrame>,
    frames_open: bool,
    cell: FrameCell,
    session: ScanSession,
    events: mpsc::UnboundedReceiver<ScanEvent>,
}

impl ActiveScan {
    fn start(runtime: &tokio::runtime::Runtime, device: &CameraDevice, config: &Config) -> ScanResult<Self> {
        info!(device = %device.name, "Starting scan");

        let formats = query_formats(device)?;
        let format = select_capture_format(&formats).ok_or_else(|| {
            ScanError::Other(format!("No usable capture format on {}", device.name))
        })?;

        let (sender, frames) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let pipeline = CameraPipeline::open(device, &format, sender)?;

        let cell = FrameCell::new();
        let options = ScanOptions {
            interval: config.scan_interval(),
            continuous: config.continuous,
        };

        // ScanSession spawns onto the runtime; it takes ownership of the
        // pipeline and releases the camera when the session ends.
        let _guard = runtime.enter();
        let (session, events) =
            ScanSession::start(cell.clone(), Box::new(pipeline), QrDetector::new(), options);

        Ok(Self {
            frames,
            frames_open: true,
            cell,
            session,
            events,
        })
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    let cameras = enumerate_cameras()?;
    if cameras.is_empty() {
        return Err(Box::new(ScanError::Camera(
            crate::backends::camera::BackendError::NoCameraFound,
        )));
    }

    info!(count = cameras.len(), "Found cameras");
    let multi_camera = cameras.len() > 1;

    let mut current_camera_index = cameras
        .iter()
        .position(|c| Some(c.path.to_string_lossy().to_string()) == config.last_camera_path)
        .unwrap_or(0);

    let mut scan = Some(ActiveScan::start(
        &runtime,
        &cameras[current_camera_index],
        &config,
    )?);

    let mut frame_widget = FrameWidget::new(config.mirror_preview);
    let mut last_detection: Option<(QrDetection, String)> = None;
    let mut status_message = build_status_message(multi_camera);
    let mut show_help = false;

    loop {
        if let Some(active) = scan.as_mut() {
            // Drain frames, newest wins for both display and decoding
            while active.frames_open {
                match active.frames.try_next() {
                    Ok(Some(frame)) => {
                        frame_widget.update_frame(frame.clone());
                        active.cell.store(Arc::new(frame));
                    }
                    Ok(None) => {
                        active.cell.mark_gone();
                        active.frames_open = false;
                    }
                    Err(_) => break,
                }
            }

            // Session events
            while let Ok(Some(event)) = active.events.try_next() {
                match event {
                    ScanEvent::Detected(detection) => {
                        let at = chrono::Local::now().format("%H:%M:%S").to_string();
                        frame_widget.set_highlight(Some(detection.bounds.clone()));
                        status_message = detection_message(&detection, &at);
                        show_help = false;
                        last_detection = Some((detection, at));
                    }
                    ScanEvent::CameraGone => {
                        status_message = "Camera disconnected | 'r' retry | 'q' quit".into();
                    }
                    ScanEvent::Closed => {
                        if last_detection.is_none() {
                            status_message = "Scan stopped | 'r' rescan | 'q' quit".into();
                        }
                    }
                }
            }
        }

        terminal.draw(|f| {
            let area = f.area();

            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if event::poll(TERMINAL_POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C or 'q' to quit
            if key.code == KeyCode::Char('q')
                || (key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL))
            {
                break;
            }

            // 'r' to rescan (restarts the pipeline and session)
            if key.code == KeyCode::Char('r') {
                scan = None; // drop first: old session must release the device
                frame_widget.set_highlight(None);
                last_detection = None;
                show_help = false;
                match ActiveScan::start(&runtime, &cameras[current_camera_index], &config) {
                    Ok(active) => {
                        scan = Some(active);
                        status_message = build_status_message(multi_camera);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to restart scan");
                        status_message = format!("Error: {}", e);
                    }
                }
            }

            // 's' to switch camera
            if key.code == KeyCode::Char('s') && multi_camera {
                scan = None;
                frame_widget = FrameWidget::new(config.mirror_preview);
                last_detection = None;
                show_help = false;
                current_camera_index = (current_camera_index + 1) % cameras.len();

                match ActiveScan::start(&runtime, &cameras[current_camera_index], &config) {
                    Ok(active) => {
                        scan = Some(active);
                        status_message = build_status_message(multi_camera);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to switch camera");
                        status_message = format!("Error: {}", e);
                    }
                }
            }

            // 'o' to open a detected link
            if key.code == KeyCode::Char('o')
                && let Some((detection, _)) = &last_detection
                && let QrAction::Url(url) = &detection.action
            {
                status_message = match open::that(url) {
                    Ok(()) => format!("Opened {}", url),
                    Err(e) => format!("Error: {}", e),
                };
            }

            // 'h' to toggle help
            if key.code == KeyCode::Char('h') {
                status_message = toggle_help(&mut show_help, multi_camera);
            }
        }
    }

    config.last_camera_path = Some(
        cameras[current_camera_index]
            .path
            .to_string_lossy()
            .to_string(),
    );
    if let Err(e) = config.save() {
        error!(error = %e, "Failed to save configuration");
    }

    // Explicitly end the session so the camera is released before the
    // terminal is restored
    if let Some(active) = &scan {
        active.session.close();
    }
    drop(scan);

    Ok(())
}

fn build_status_message(multi_camera: bool) -> String {
    let mut msg = "Scanning...".to_string();
    if multi_camera {
        msg.push_str(" | 's' switch camera");
    }
    msg.push_str(" | 'h' help | 'q' quit");
    msg
}

fn build_help_message(multi_camera: bool) -> String {
    let mut msg = String::from("r: Rescan | o: Open link | ");
    if multi_camera {
        msg.push_str("s: Switch camera | ");
    }
    msg.push_str("q/Ctrl+C: Quit");
    msg
}

/// Flip help visibility, returning the status line to show
fn toggle_help(show_help: &mut bool, multi_camera: bool) -> String {
    *show_help = !*show_help;
    if *show_help {
        build_help_message(multi_camera)
    } else {
        build_status_message(multi_camera)
    }
}

fn detection_message(detection: &QrDetection, at: &str) -> String {
    let mut msg = format!("[{}] {}: {}", at, detection.action.action_label(), detection.content);
    if let QrAction::Url(_) = detection.action {
        msg.push_str(" | 'o' open");
    }
    msg.push_str(" | 'r' rescan");
    msg
}

/// Widget that renders a camera frame using half-block characters
///
/// Each terminal cell shows two vertical pixels: the upper half as the
/// foreground of a `▀` glyph, the lower half as the background.
struct FrameWidget {
    frame: Option<CameraFrame>,
    highlight: Option<FrameRegion>,
    mirror: bool,
}

impl FrameWidget {
    fn new(mirror: bool) -> Self {
        Self {
            frame: None,
            highlight: None,
            mirror,
        }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }

    fn set_highlight(&mut self, region: Option<FrameRegion>) {
        self.highlight = region;
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Fit the frame into the area preserving aspect ratio; half-blocks
        // double the vertical resolution.
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            ((h * frame_aspect) as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            (w as u16, (w / frame_aspect / 2.0) as u16)
        };

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let sample_tx = if self.mirror {
                    display_width - 1 - tx
                } else {
                    tx
                };
                let src_x = (sample_tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let mut top_color = sample_pixel(frame, src_x, src_y_top);
                let mut bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(region) = &self.highlight {
                    // Region coordinates are in frame space, so the mirrored
                    // sample column is the one to test
                    let fx = sample_tx as f32 / display_width as f32;
                    if on_region_edge(region, fx, src_y_top as f32 / frame.height as f32) {
                        top_color = Color::Green;
                    }
                    if on_region_edge(region, fx, src_y_bottom as f32 / frame.height as f32) {
                        bottom_color = Color::Green;
                    }
                }

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Whether a normalized point lies on the outline of a region
fn on_region_edge(region: &FrameRegion, x: f32, y: f32) -> bool {
    const EDGE: f32 = 0.01;
    let inside_x = x >= region.x - EDGE && x <= region.x + region.width + EDGE;
    let inside_y = y >= region.y - EDGE && y <= region.y + region.height + EDGE;
    let on_vertical =
        (x - region.x).abs() <= EDGE || (x - (region.x + region.width)).abs() <= EDGE;
    let on_horizontal =
        (y - region.y).abs() <= EDGE || (y - (region.y + region.height)).abs() <= EDGE;
    (inside_y && on_vertical) || (inside_x && on_horizontal)
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width.saturating_sub(1));
    let y = y.min(frame.height.saturating_sub(1));
    let data = frame.data_slice();

    let (r, g, b) = match frame.format {
        PixelFormat::Rgba => {
            let idx = (y * frame.stride + x * 4) as usize;
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Rgb24 => {
            let idx = (y * frame.stride + x * 3) as usize;
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Gray8 => {
            let idx = (y * frame.stride + x) as usize;
            let v = data.get(idx).copied().unwrap_or(0);
            (v, v, v)
        }
    };

    Color::Rgb(r, g, b)
}

/// One-line status bar at the bottom of the view
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = ratatui::style::Style::default()
            .fg(Color::Black)
            .bg(Color::Gray);
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_style(style);
            }
        }
        buf.set_string(area.x + 1, area.y, self.message, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_region_edge() {
        let region = FrameRegion {
            x: 0.2,
            y: 0.2,
            width: 0.4,
            height: 0.4,
        };
        assert!(on_region_edge(&region, 0.2, 0.3));
        assert!(on_region_edge(&region, 0.4, 0.6));
        assert!(!on_region_edge(&region, 0.4, 0.4));
        assert!(!on_region_edge(&region, 0.9, 0.9));
    }

    #[test]
    fn test_mirrored_highlight_follows_mirrored_image() {
        // Region on the left quarter of the frame; mirroring shows that part
        // of the image on the right, so the outline must land there too.
        let mut widget = FrameWidget::new(true);
        widget.update_frame(CameraFrame::packed(
            100,
            50,
            PixelFormat::Gray8,
            vec![128; 100 * 50],
        ));
        widget.set_highlight(Some(FrameRegion {
            x: 0.0,
            y: 0.25,
            width: 0.25,
            height: 0.5,
        }));

        // 100x25 cells fits the 2:1 frame exactly with half-blocks
        let area = Rect::new(0, 0, 100, 25);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let green_in = |xs: std::ops::Range<u16>| {
            xs.clone().any(|x| {
                (0..25).any(|y| {
                    buf.cell((x, y))
                        .is_some_and(|c| c.fg == Color::Green || c.bg == Color::Green)
                })
            })
        };
        assert!(green_in(70..100), "outline must render on the mirrored side");
        assert!(!green_in(0..30), "outline must not render on the source side");
    }

    #[test]
    fn test_toggle_help_round_trip() {
        let mut show_help = false;
        let normal = build_status_message(false);

        let shown = toggle_help(&mut show_help, false);
        assert!(show_help);
        assert_eq!(shown, build_help_message(false));

        let restored = toggle_help(&mut show_help, false);
        assert!(!show_help);
        assert_eq!(restored, normal);
    }

    #[test]
    fn test_detection_message_for_url() {
        let detection = QrDetection::new(
            FrameRegion {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
            "https://example.com".into(),
        );
        let msg = detection_message(&detection, "12:00:00");
        assert!(msg.contains("Open Link"));
        assert!(msg.contains("'o' open"));
    }
}
