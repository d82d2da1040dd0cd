//! Job responses returned to the host runtime.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::{JobRequest, Resolution};

/// Round to two decimals, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Encoded profiling report attached to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileReport {
    /// Base64 report contents
    pub base64: String,
    /// Report file name (no directory)
    pub filename: String,
}

/// Successful job response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    pub video_base64: String,
    pub generation_time_seconds: f64,
    pub num_frames: u32,
    pub fps: u32,
    pub video_duration_seconds: f64,
    pub resolution: Resolution,
    pub num_steps: u32,
    pub seed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_report_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_filename: Option<String>,
}

impl JobResult {
    /// Build a result from the effective request values.
    pub fn new(
        request: &JobRequest,
        video_base64: String,
        generation_time_seconds: f64,
        profile: Option<ProfileReport>,
    ) -> Self {
        let (profile_report_base64, profile_filename) = match profile {
            Some(report) => (Some(report.base64), Some(report.filename)),
            None => (None, None),
        };

        Self {
            video_base64,
            generation_time_seconds: round2(generation_time_seconds),
            num_frames: request.num_frames,
            fps: request.fps,
            video_duration_seconds: round2(request.video_duration_seconds()),
            resolution: request.resolution,
            num_steps: request.steps,
            seed: request.seed,
            profile_report_base64,
            profile_filename,
        }
    }
}

/// Stage classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Fetch,
    ModelLoad,
    Generation,
    Packaging,
    #[default]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Fetch => "fetch",
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::Generation => "generation",
            ErrorKind::Packaging => "packaging",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed job response. Serializes as `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    #[serde(skip)]
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Either a complete result or a single-field error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobResponse {
    Success(JobResult),
    Failure(JobError),
}

impl JobResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResponse::Success(_))
    }

    pub fn result(&self) -> Option<&JobResult> {
        match self {
            JobResponse::Success(result) => Some(result),
            JobResponse::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match self {
            JobResponse::Success(_) => None,
            JobResponse::Failure(error) => Some(error),
        }
    }
}

impl From<Result<JobResult, JobError>> for JobResponse {
    fn from(result: Result<JobResult, JobError>) -> Self {
        match result {
            Ok(result) => JobResponse::Success(result),
            Err(error) => JobResponse::Failure(error),
        }
    }
}
