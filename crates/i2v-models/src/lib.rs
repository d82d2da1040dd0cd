//! Shared data models for the image-to-video worker.
//!
//! This crate provides Serde-serializable types for:
//! - The job envelope delivered by the host runtime
//! - Job input parsing, defaults and validation
//! - Job results and the single-field error response

pub mod job;
pub mod result;

// Re-export common types
pub use job::{
    InputError, JobEnvelope, JobId, JobInput, JobRequest, Resolution, DEFAULT_FPS,
    DEFAULT_NUM_FRAMES, DEFAULT_SEED, DEFAULT_STEPS,
};
pub use result::{round2, ErrorKind, JobError, JobResponse, JobResult, ProfileReport};
