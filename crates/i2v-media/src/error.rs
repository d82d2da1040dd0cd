//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("{message}")]
    ProcessFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a process failure error.
    pub fn process_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Diagnostic text for a failed process: captured stderr when there is
    /// any, otherwise the error message.
    pub fn diagnostic(&self) -> String {
        match self {
            MediaError::ProcessFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => stderr.trim().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let err = MediaError::process_failed(
            "process exited with status 1",
            Some("CUDA out of memory\n".into()),
            Some(1),
        );
        assert_eq!(err.diagnostic(), "CUDA out of memory");

        let err = MediaError::process_failed("process exited with status 2", Some("  ".into()), Some(2));
        assert_eq!(err.diagnostic(), "process exited with status 2");
    }
}
