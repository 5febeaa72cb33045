// SPDX-License-Identifier: GPL-3.0-only

//! Detection result types
//!
//! These represent what a scan reports back to the caller: where a code was
//! found, the raw payload, and a parsed action the surrounding UI can offer.

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so they survive display scaling and downsampled decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x / frame_width as f32,
            y: y / frame_height as f32,
            width: width / frame_width as f32,
            height: height / frame_height as f32,
        }
    }
}

/// WiFi security type parsed from a WIFI: payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiSecurity {
    /// Open network
    None,
    /// WEP (legacy)
    Wep,
    /// WPA/WPA2 Personal
    Wpa,
    /// WPA3
    Wpa3,
}

impl WifiSecurity {
    fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WEP" => Self::Wep,
            "WPA3" | "SAE" => Self::Wpa3,
            "NOPASS" | "" => Self::None,
            _ => Self::Wpa,
        }
    }

    /// Display name for the security type
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA/WPA2",
            Self::Wpa3 => "WPA3",
        }
    }
}

/// Action derived from decoded payload content
///
/// Unrecognized payloads fall back to `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum QrAction {
    /// URL that can be opened in a browser
    Url(String),
    /// WiFi network credentials
    Wifi {
        ssid: String,
        password: Option<String>,
        security: WifiSecurity,
        hidden: bool,
    },
    /// Phone number (tel: URI)
    Phone(String),
    /// Email address (mailto: URI)
    Email {
        address: String,
        subject: Option<String>,
    },
    /// Plain text
    Text(String),
}

impl QrAction {
    /// Parse payload content into an action
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        if trimmed.starts_with("WIFI:") {
            return Self::parse_wifi(trimmed);
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Self::Url(trimmed.to_string());
        }
        if let Some(number) = trimmed.strip_prefix("tel:") {
            return Self::Phone(number.to_string());
        }
        if let Some(rest) = trimmed.strip_prefix("mailto:") {
            let (address, params) = rest.split_once('?').unwrap_or((rest, ""));
            let subject = params.split('&').find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.eq_ignore_ascii_case("subject")
                    .then(|| urlencoding_decode(value))
            });
            return Self::Email {
                address: address.to_string(),
                subject,
            };
        }

        Self::Text(trimmed.to_string())
    }

    /// Parse the WIFI:S:<ssid>;T:<security>;P:<password>;; format
    fn parse_wifi(content: &str) -> Self {
        let mut ssid = String::new();
        let mut password = None;
        let mut security = WifiSecurity::None;
        let mut hidden = false;

        let content = content.strip_prefix("WIFI:").unwrap_or(content);
        for field in split_escaped_fields(content) {
            if let Some((key, value)) = field.split_once(':') {
                let value = unescape_wifi_value(value);
                match key {
                    "S" => ssid = value,
                    "P" => password = Some(value),
                    "T" => security = WifiSecurity::parse(&value),
                    "H" => hidden = value.eq_ignore_ascii_case("true"),
                    _ => {}
                }
            }
        }

        Self::Wifi {
            ssid,
            password,
            security,
            hidden,
        }
    }

    /// Label for the primary action the UI should offer
    pub fn action_label(&self) -> &'static str {
        match self {
            Self::Url(_) => "Open Link",
            Self::Wifi { .. } => "Connect to WiFi",
            Self::Phone(_) => "Call",
            Self::Email { .. } => "Send Email",
            Self::Text(_) => "Copy Text",
        }
    }
}

/// Split a WIFI: payload body on `;` separators
///
/// A backslash escapes the following character, so `\;` stays inside the
/// current field instead of ending it. Escape sequences are kept verbatim
/// for [`unescape_wifi_value`] to resolve.
fn split_escaped_fields(content: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in content.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ';' {
            if !current.is_empty() {
                fields.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if escaped {
        // Trailing lone backslash, keep it literal
        current.push('\\');
    }
    if !current.is_empty() {
        fields.push(current);
    }

    fields
}

fn unescape_wifi_value(value: &str) -> String {
    value
        .replace("\\;", ";")
        .replace("\\:", ":")
        .replace("\\,", ",")
        .replace("\\\\", "\\")
}

/// Percent-decoding for mailto query parameters
fn urlencoding_decode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                } else {
                    result.push('%');
                    result.push_str(&hex);
                }
            }
            '+' => result.push(' '),
            _ => result.push(c),
        }
    }

    result
}

/// A decoded code with its location and parsed content
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    /// Bounding box in normalized frame coordinates
    pub bounds: FrameRegion,
    /// Raw decoded payload
    pub content: String,
    /// Parsed action based on content type
    pub action: QrAction,
}

impl QrDetection {
    /// Create a detection, parsing the payload into an action
    pub fn new(bounds: FrameRegion, content: String) -> Self {
        let action = QrAction::parse(&content);
        Self {
            bounds,
            content,
            action,
        }
    }
}
