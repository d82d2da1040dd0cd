//! Generation dispatch.
//!
//! A [`GenerationBackend`] turns one request into a video file on disk.
//! Two implementations satisfy the same contract:
//! - [`InProcessBackend`] calls the resident model handle
//! - [`SubprocessBackend`] launches the standalone generation program,
//!   optionally wrapped by the profiling harness
//!
//! The [`Dispatcher`] picks the backend for a job, decides whether profiling
//! applies, and measures wall-clock generation time.

mod in_process;
mod subprocess;

pub use in_process::InProcessBackend;
pub use subprocess::SubprocessBackend;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use i2v_media::{Profiler, ProfilerAvailability};
use i2v_models::JobRequest;

use crate::error::WorkerResult;
use crate::logging::{JobLogger, Stage};
use crate::metrics;
use crate::model::GenerationRequest;

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub request: GenerationRequest,
    /// Write a profiling report here; `None` runs unprofiled.
    pub profile_report: Option<PathBuf>,
}

/// What a successful dispatch produced.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub output_video: PathBuf,
    /// Set when the run was profiled.
    pub profile_report: Option<PathBuf>,
    pub elapsed: Duration,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Acquire whatever the backend needs before a job runs.
    async fn prepare(&self) -> WorkerResult<()> {
        Ok(())
    }

    /// Produce the video at `job.request.save_path`.
    async fn generate(&self, job: &GenerationJob) -> WorkerResult<()>;
}

/// Chooses a backend per job and times the generation step.
pub struct Dispatcher {
    default: Arc<dyn GenerationBackend>,
    profiled: Arc<dyn GenerationBackend>,
    profiler: Profiler,
}

impl Dispatcher {
    /// `default` serves ordinary jobs; `profiled` runs jobs that asked for
    /// profiling when the harness is available.
    pub fn new(
        default: Arc<dyn GenerationBackend>,
        profiled: Arc<dyn GenerationBackend>,
        profiler: Profiler,
    ) -> Self {
        Self {
            default,
            profiled,
            profiler,
        }
    }

    pub fn default_backend(&self) -> &str {
        self.default.name()
    }

    /// Acquire the default backend's resources (the model, in-process).
    pub async fn prepare(&self) -> WorkerResult<()> {
        self.default.prepare().await
    }

    /// Run one generation.
    pub async fn dispatch(
        &self,
        request: &JobRequest,
        input_image: &Path,
        output_video: &Path,
        profile_report: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<GenerationOutput> {
        let profile_report = match self.profiling_decision(request.enable_profiling) {
            ProfilingDecision::NotRequested => None,
            ProfilingDecision::Profile => Some(profile_report.to_path_buf()),
            ProfilingDecision::Skip { reason } => {
                logger.warn(
                    Stage::Dispatch,
                    &format!(
                        "Profiling requested but harness unavailable ({}), running without it",
                        reason
                    ),
                );
                None
            }
        };
        let backend = if profile_report.is_some() {
            &self.profiled
        } else {
            &self.default
        };

        let job = GenerationJob {
            request: GenerationRequest::new(
                request,
                input_image.to_path_buf(),
                output_video.to_path_buf(),
            ),
            profile_report: profile_report.clone(),
        };

        logger.stage(
            Stage::Dispatch,
            &format!(
                "Generating video with {} backend{}",
                backend.name(),
                if profile_report.is_some() { " (profiled)" } else { "" }
            ),
        );
        let start = Instant::now();
        backend.generate(&job).await?;
        let elapsed = start.elapsed();

        metrics::record_generation(backend.name(), elapsed.as_secs_f64());
        logger.stage(
            Stage::Dispatch,
            &format!("Video generated in {:.2}s", elapsed.as_secs_f64()),
        );

        Ok(GenerationOutput {
            output_video: output_video.to_path_buf(),
            profile_report,
            elapsed,
        })
    }

    fn profiling_decision(&self, requested: bool) -> ProfilingDecision {
        if !requested {
            return ProfilingDecision::NotRequested;
        }
        match self.profiler.detect() {
            ProfilerAvailability::Available(_) => ProfilingDecision::Profile,
            ProfilerAvailability::Unavailable { reason } => ProfilingDecision::Skip { reason },
        }
    }
}

/// Outcome of the profiling check for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProfilingDecision {
    NotRequested,
    Profile,
    Skip { reason: String },
}
