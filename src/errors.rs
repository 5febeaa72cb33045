// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner application

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Camera backend errors
    Camera(BackendError),
    /// Still-image loading errors
    Image(String),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Camera(e) => write!(f, "Camera error: {}", e),
            ScanError::Image(msg) => write!(f, "Image error: {}", msg),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::Camera(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScanError::Image("unsupported extension: svg".into());
        assert_eq!(err.to_string(), "Image error: unsupported extension: svg");
    }

    #[test]
    fn test_backend_error_conversion() {
        let err: ScanError = BackendError::NoCameraFound.into();
        assert!(matches!(err, ScanError::Camera(_)));
    }
}
