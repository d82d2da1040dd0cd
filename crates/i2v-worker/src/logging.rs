//! Per-job structured logging.
//!
//! Every event carries the job ID and the milliseconds elapsed since the job
//! was accepted; stage events also carry the pipeline stage.

use std::fmt;
use std::time::Instant;

use i2v_models::{JobId, JobRequest, JobResult};
use tracing::{error, info, info_span, warn, Span};

use crate::error::WorkerError;

/// Pipeline stage a log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AcquireModel,
    ResolveInput,
    Dispatch,
    Package,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AcquireModel => "acquire_model",
            Stage::ResolveInput => "resolve_input",
            Stage::Dispatch => "dispatch",
            Stage::Package => "package",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    accepted_at: Instant,
}

impl JobLogger {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            accepted_at: Instant::now(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn elapsed_ms(&self) -> u128 {
        self.accepted_at.elapsed().as_millis()
    }

    /// Span wrapping every event of this job.
    pub fn span(&self) -> Span {
        info_span!("i2v_job", job_id = %self.job_id)
    }

    /// The request passed validation.
    pub fn accepted(&self, request: &JobRequest) {
        info!(
            job_id = %self.job_id,
            prompt = %request.prompt_preview(),
            steps = request.steps,
            num_frames = request.num_frames,
            fps = request.fps,
            seed = request.seed,
            resolution = %request.resolution,
            profiling = request.enable_profiling,
            "Job accepted"
        );
    }

    pub fn stage(&self, stage: Stage, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %stage,
            elapsed_ms = self.elapsed_ms() as u64,
            "{}", message
        );
    }

    pub fn warn(&self, stage: Stage, message: &str) {
        warn!(
            job_id = %self.job_id,
            stage = %stage,
            elapsed_ms = self.elapsed_ms() as u64,
            "{}", message
        );
    }

    pub fn finished(&self, result: &JobResult) {
        info!(
            job_id = %self.job_id,
            elapsed_ms = self.elapsed_ms() as u64,
            num_frames = result.num_frames,
            generation_secs = result.generation_time_seconds,
            profiled = result.profile_filename.is_some(),
            "Job succeeded"
        );
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            kind = err.kind().as_str(),
            elapsed_ms = self.elapsed_ms() as u64,
            "Job failed: {}", err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<_> = [
            Stage::AcquireModel,
            Stage::ResolveInput,
            Stage::Dispatch,
            Stage::Package,
        ]
        .iter()
        .map(Stage::to_string)
        .collect();
        assert_eq!(names, ["acquire_model", "resolve_input", "dispatch", "package"]);
    }

    #[test]
    fn test_logger_keeps_job_id() {
        let logger = JobLogger::new(JobId::from_string("job-123"));
        assert_eq!(logger.job_id().as_str(), "job-123");
        logger.stage(Stage::Dispatch, "Generating");
        logger.failed(&WorkerError::MissingOutput);
    }
}
