//! Job orchestration: the function the host runtime calls.
//!
//! Each job runs `validate -> acquire model -> resolve input -> dispatch ->
//! package -> respond`. The first failing stage short-circuits to an error
//! response; nothing is retried and no error escapes as a fault.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{warn, Instrument};

use i2v_media::{save_snapshot, ImageFetcher, Profiler, RgbImage};
use i2v_models::{
    ErrorKind, JobEnvelope, JobError, JobInput, JobRequest, JobResponse, JobResult,
};

use crate::artifacts::{package, JobScratch};
use crate::backend::{Dispatcher, GenerationBackend, InProcessBackend, SubprocessBackend};
use crate::config::{BackendKind, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::{JobLogger, Stage};
use crate::metrics;
use crate::model::ModelManager;
use crate::resident::ResidentModelLoader;

/// Handles one job at a time; the model handle is the only state kept
/// between jobs.
pub struct JobHandler {
    scratch_dir: PathBuf,
    fetcher: ImageFetcher,
    dispatcher: Dispatcher,
}

impl JobHandler {
    pub fn new(scratch_dir: impl Into<PathBuf>, fetcher: ImageFetcher, dispatcher: Dispatcher) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            fetcher,
            dispatcher,
        }
    }

    /// Build the production handler for `config`.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let fetcher = ImageFetcher::new(config.fetch_timeout)
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;
        let profiler = Profiler::new(&config.profiler_path);

        let subprocess: Arc<dyn GenerationBackend> = Arc::new(SubprocessBackend::new(
            config.generator.clone(),
            config.model.clone(),
            profiler.clone(),
        ));
        let default: Arc<dyn GenerationBackend> = match config.backend {
            BackendKind::Subprocess => Arc::clone(&subprocess),
            BackendKind::InProcess => {
                let loader = Arc::new(ResidentModelLoader::new(config.model_server.clone()));
                let manager = Arc::new(ModelManager::new(config.model.clone(), loader));
                Arc::new(InProcessBackend::new(manager))
            }
        };

        Ok(Self::new(
            config.scratch_dir.clone(),
            fetcher,
            Dispatcher::new(default, subprocess, profiler),
        ))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle a raw job body as delivered by the host.
    pub async fn handle(&self, job: &serde_json::Value) -> JobResponse {
        self.handle_envelope(JobEnvelope::from_value(job)).await
    }

    /// Handle one line of text holding a JSON job body.
    pub async fn handle_line(&self, line: &str) -> JobResponse {
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(job) => self.handle(&job).await,
            Err(e) => {
                warn!("Rejecting malformed job body: {}", e);
                JobResponse::Failure(JobError::new(
                    ErrorKind::Validation,
                    format!("Invalid input: malformed job JSON: {}", e),
                ))
            }
        }
    }

    /// Serve jobs one per line from `reader`, writing one response line per
    /// job to `writer`. Jobs are handled strictly one at a time; blank lines
    /// are skipped. Returns when `reader` reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> WorkerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line).await;
            let mut out = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Handle a parsed job envelope.
    pub async fn handle_envelope(&self, envelope: JobEnvelope) -> JobResponse {
        let logger = JobLogger::new(envelope.job_id());
        let span = logger.span();

        match self.run(&envelope.input, &logger).instrument(span).await {
            Ok(result) => {
                metrics::record_job("success", "none");
                logger.finished(&result);
                JobResponse::Success(result)
            }
            Err(e) => {
                metrics::record_job("failure", e.kind().as_str());
                logger.failed(&e);
                JobResponse::Failure(e.into_job_error())
            }
        }
    }

    async fn run(&self, input: &serde_json::Value, logger: &JobLogger) -> WorkerResult<JobResult> {
        let request = JobInput::from_value(input)?.validate()?;
        logger.accepted(&request);

        logger.stage(Stage::AcquireModel, "Acquiring generation backend");
        self.dispatcher.prepare().await?;

        logger.stage(Stage::ResolveInput, "Downloading input image");
        let image = self
            .fetcher
            .fetch(&request.image_url)
            .await
            .map_err(WorkerError::fetch)?;

        let scratch = JobScratch::create(&self.scratch_dir).await?;
        let result = self.generate_and_package(&request, image, &scratch, logger).await;
        scratch.cleanup().await;
        result
    }

    async fn generate_and_package(
        &self,
        request: &JobRequest,
        image: RgbImage,
        scratch: &JobScratch,
        logger: &JobLogger,
    ) -> WorkerResult<JobResult> {
        save_snapshot(image, scratch.input_image().to_path_buf())
            .await
            .map_err(WorkerError::fetch)?;

        let output = self
            .dispatcher
            .dispatch(
                request,
                scratch.input_image(),
                scratch.output_video(),
                scratch.profile_report(),
                logger,
            )
            .await?;

        logger.stage(Stage::Package, "Encoding video");
        let packaged = package(scratch, output.profile_report.as_deref()).await?;

        Ok(JobResult::new(
            request,
            packaged.video_base64,
            output.elapsed.as_secs_f64(),
            packaged.profile,
        ))
    }
}
