//! Job definitions: the envelope delivered by the host runtime, the raw
//! input it carries, and the validated request the worker acts on.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_STEPS: u32 = 4;
pub const DEFAULT_SEED: i64 = 0;
pub const DEFAULT_NUM_FRAMES: u32 = 81;
pub const DEFAULT_FPS: u32 = 24;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output resolution label understood by the generative model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job as delivered by the host runtime: `{"id": ..., "input": {...}}`.
///
/// `input` is kept as raw JSON so that a malformed body still reaches the
/// handler and can be answered with an error response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct JobEnvelope {
    /// Host-assigned job ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Raw job input
    #[serde(default)]
    pub input: serde_json::Value,
}

impl JobEnvelope {
    /// Pull the envelope out of a raw job body.
    ///
    /// Never fails: a numeric `id` is kept in its decimal form, any other
    /// non-string `id` is dropped, and a missing `input` becomes `null`.
    pub fn from_value(job: &serde_json::Value) -> Self {
        let id = match job.get("id") {
            Some(serde_json::Value::String(id)) => Some(id.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            id,
            input: job.get("input").cloned().unwrap_or_default(),
        }
    }

    /// Job ID from the envelope, or a fresh one if the host sent none.
    pub fn job_id(&self) -> JobId {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => JobId::from_string(id),
            _ => JobId::new(),
        }
    }
}

/// Raw job input with defaults applied for every optional field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobInput {
    /// Text prompt (required)
    #[serde(default)]
    pub prompt: Option<String>,

    /// Reference image URL (required)
    #[serde(default)]
    pub image_url: Option<String>,

    /// Sampling steps
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Random seed
    #[serde(default)]
    pub seed: i64,

    /// Number of frames to generate
    #[serde(default = "default_num_frames")]
    pub num_frames: u32,

    /// Playback frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Wrap generation with the profiling harness
    #[serde(default)]
    pub enable_profiling: bool,

    /// Output resolution
    #[serde(default)]
    pub resolution: Resolution,
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_num_frames() -> u32 {
    DEFAULT_NUM_FRAMES
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

/// Reasons a job input is rejected before any resource is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Missing prompt or image_url")]
    MissingRequired,

    #[error("{0}")]
    Malformed(String),

    #[error("image_url is not a valid http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("{0} must be a positive integer")]
    NotPositive(&'static str),
}

impl JobInput {
    /// Parse raw JSON into a job input.
    ///
    /// `prompt` and `image_url` must be non-empty strings; that is checked
    /// before any other field is decoded. Anything other than an object
    /// (including a missing input) has neither.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, InputError> {
        if !has_text(value, "prompt") || !has_text(value, "image_url") {
            return Err(InputError::MissingRequired);
        }
        serde_json::from_value(value.clone()).map_err(|e| InputError::Malformed(e.to_string()))
    }

    /// Validate and normalize into a [`JobRequest`].
    pub fn validate(self) -> Result<JobRequest, InputError> {
        let prompt = self.prompt.filter(|p| !p.is_empty());
        let image_url = self.image_url.filter(|u| !u.is_empty());
        let (Some(prompt), Some(image_url)) = (prompt, image_url) else {
            return Err(InputError::MissingRequired);
        };

        let image_url = Url::parse(image_url.trim())
            .map_err(|e| InputError::InvalidUrl(format!("{}: {}", image_url, e)))?;
        if !matches!(image_url.scheme(), "http" | "https") {
            return Err(InputError::InvalidUrl(image_url.to_string()));
        }

        if self.steps == 0 {
            return Err(InputError::NotPositive("steps"));
        }
        if self.num_frames == 0 {
            return Err(InputError::NotPositive("num_frames"));
        }
        if self.fps == 0 {
            return Err(InputError::NotPositive("fps"));
        }

        Ok(JobRequest {
            prompt,
            image_url,
            steps: self.steps,
            seed: self.seed,
            num_frames: self.num_frames,
            fps: self.fps,
            enable_profiling: self.enable_profiling,
            resolution: self.resolution,
        })
    }
}

fn has_text(value: &serde_json::Value, field: &str) -> bool {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// A validated job request. Every field holds its effective value.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub prompt: String,
    pub image_url: Url,
    pub steps: u32,
    pub seed: i64,
    pub num_frames: u32,
    pub fps: u32,
    pub enable_profiling: bool,
    pub resolution: Resolution,
}

impl JobRequest {
    /// Playback duration of the generated clip in seconds.
    pub fn video_duration_seconds(&self) -> f64 {
        f64::from(self.num_frames) / f64::from(self.fps)
    }

    /// Prompt shortened for log lines.
    pub fn prompt_preview(&self) -> String {
        const MAX_CHARS: usize = 80;
        if self.prompt.chars().count() <= MAX_CHARS {
            self.prompt.clone()
        } else {
            let head: String = self.prompt.chars().take(MAX_CHARS).collect();
            format!("{}...", head)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<JobRequest, InputError> {
        JobInput::from_value(&value)?.validate()
    }

    #[test]
    fn test_defaults_applied() {
        let req = parse(json!({"prompt": "a cat", "image_url": "http://x/img.jpg"})).unwrap();
        assert_eq!(req.steps, 4);
        assert_eq!(req.seed, 0);
        assert_eq!(req.num_frames, 81);
        assert_eq!(req.fps, 24);
        assert!(!req.enable_profiling);
        assert_eq!(req.resolution, Resolution::P720);
        assert_eq!(req.image_url.as_str(), "http://x/img.jpg");
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            parse(json!({"prompt": "a cat"})).unwrap_err(),
            InputError::MissingRequired
        );
        assert_eq!(
            parse(json!({"image_url": "http://x/img.jpg"})).unwrap_err(),
            InputError::MissingRequired
        );
        assert_eq!(
            parse(json!({"prompt": "", "image_url": "http://x/img.jpg"})).unwrap_err(),
            InputError::MissingRequired
        );
        assert_eq!(parse(json!(null)).unwrap_err(), InputError::MissingRequired);
        assert_eq!(
            parse(json!({"prompt": 7, "image_url": "http://x/img.jpg"})).unwrap_err(),
            InputError::MissingRequired
        );
    }

    #[test]
    fn test_missing_field_reported_before_type_errors() {
        assert_eq!(
            parse(json!({"prompt": "a cat", "steps": "4"})).unwrap_err(),
            InputError::MissingRequired
        );
        assert_eq!(
            parse(json!({"image_url": "http://x/img.jpg", "resolution": 720})).unwrap_err(),
            InputError::MissingRequired
        );
    }

    #[test]
    fn test_whitespace_prompt_is_present() {
        let req = parse(json!({"prompt": "  ", "image_url": "http://x/img.jpg"})).unwrap();
        assert_eq!(req.prompt, "  ");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            parse(json!({"prompt": "p", "image_url": "not a url"})),
            Err(InputError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse(json!({"prompt": "p", "image_url": "ftp://x/img.jpg"})),
            Err(InputError::InvalidUrl(_))
        ));
        assert_eq!(
            parse(json!({"prompt": "p", "image_url": "http://x/a.jpg", "fps": 0})).unwrap_err(),
            InputError::NotPositive("fps")
        );
        assert!(matches!(
            parse(json!({"prompt": "p", "image_url": "http://x/a.jpg", "resolution": "1080p"})),
            Err(InputError::Malformed(_))
        ));
        assert!(matches!(
            parse(json!({"prompt": "p", "image_url": "http://x/a.jpg", "steps": "four"})),
            Err(InputError::Malformed(_))
        ));
    }

    #[test]
    fn test_explicit_values() {
        let req = parse(json!({
            "prompt": "a dog",
            "image_url": "https://example.com/dog.png",
            "steps": 8,
            "seed": 42,
            "num_frames": 49,
            "fps": 16,
            "enable_profiling": true,
            "resolution": "480p"
        }))
        .unwrap();
        assert_eq!(req.steps, 8);
        assert_eq!(req.seed, 42);
        assert_eq!(req.resolution.as_str(), "480p");
        assert!(req.enable_profiling);
        assert!((req.video_duration_seconds() - 49.0 / 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_envelope_job_id() {
        let env: JobEnvelope = serde_json::from_value(json!({"id": "job-1", "input": {}})).unwrap();
        assert_eq!(env.job_id().as_str(), "job-1");

        let env: JobEnvelope = serde_json::from_value(json!({"input": {}})).unwrap();
        assert!(Uuid::parse_str(env.job_id().as_str()).is_ok());
    }

    #[test]
    fn test_envelope_from_loose_body() {
        let env = JobEnvelope::from_value(&json!({"id": 42, "input": {"prompt": "a cat"}}));
        assert_eq!(env.job_id().as_str(), "42");
        assert_eq!(env.input["prompt"], "a cat");

        let env = JobEnvelope::from_value(&json!({"id": ["x"], "input": {"prompt": "a cat"}}));
        assert!(Uuid::parse_str(env.job_id().as_str()).is_ok());
        assert_eq!(env.input["prompt"], "a cat");

        let env = JobEnvelope::from_value(&json!("garbage"));
        assert!(env.input.is_null());
    }

    #[test]
    fn test_prompt_preview_truncates() {
        let mut req = parse(json!({"prompt": "a", "image_url": "http://x/a.jpg"})).unwrap();
        req.prompt = "x".repeat(100);
        assert_eq!(req.prompt_preview().len(), 83);
    }
}
