//! Worker error types.

use i2v_media::MediaError;
use i2v_models::{ErrorKind, InputError, JobError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// One variant per job stage; `Display` is the message the caller sees.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Missing prompt or image_url")]
    MissingRequired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to download image: {0}")]
    Fetch(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Video generation completed but output file not found")]
    MissingOutput,

    #[error("Failed to package output: {0}")]
    Packaging(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn fetch(err: MediaError) -> Self {
        Self::Fetch(err.to_string())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn packaging(msg: impl Into<String>) -> Self {
        Self::Packaging(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stage classification for the response and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::MissingRequired | WorkerError::InvalidInput(_) => ErrorKind::Validation,
            WorkerError::ModelLoad(_) => ErrorKind::ModelLoad,
            WorkerError::Fetch(_) => ErrorKind::Fetch,
            WorkerError::Generation(_) => ErrorKind::Generation,
            WorkerError::MissingOutput | WorkerError::Packaging(_) => ErrorKind::Packaging,
            WorkerError::Config(_) | WorkerError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Convert into the error response returned to the host.
    pub fn into_job_error(self) -> JobError {
        JobError::new(self.kind(), self.to_string())
    }
}

impl From<InputError> for WorkerError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::MissingRequired => WorkerError::MissingRequired,
            other => WorkerError::InvalidInput(other.to_string()),
        }
    }
}
