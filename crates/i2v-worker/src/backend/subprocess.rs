//! Out-of-process strategy: run the standalone generation program per job.

use async_trait::async_trait;
use i2v_media::{ProcessCommand, ProcessRunner, Profiler};

use super::{GenerationBackend, GenerationJob};
use crate::config::{ModelConfig, ProgramConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::model::GenerationRequest;

/// Samples generated per invocation.
const NUM_SAMPLES: u32 = 1;

pub struct SubprocessBackend {
    program: ProgramConfig,
    model: ModelConfig,
    profiler: Profiler,
    runner: ProcessRunner,
}

impl SubprocessBackend {
    pub fn new(program: ProgramConfig, model: ModelConfig, profiler: Profiler) -> Self {
        Self {
            program,
            model,
            profiler,
            runner: ProcessRunner::new("generator"),
        }
    }

    /// Generation program command line for `request`.
    pub fn command(&self, request: &GenerationRequest) -> ProcessCommand {
        let model = &self.model;
        ProcessCommand::new(&self.program.program)
            .args(self.program.args.iter().cloned())
            .option("model", &model.model_name)
            .option("vae_path", model.vae_path().display())
            .option("text_encoder_path", model.text_encoder_path().display())
            .option("high_noise_model_path", model.high_noise_model_path().display())
            .option("low_noise_model_path", model.low_noise_model_path().display())
            .option("resolution", request.resolution)
            .option("image_path", request.image_path.display())
            .option("prompt", &request.prompt)
            .option("num_samples", NUM_SAMPLES)
            .option("num_steps", request.num_steps)
            .option("num_frames", request.num_frames)
            .option("seed", request.seed)
            .option("save_path", request.save_path.display())
            .flag("quant_linear", model.quant_linear)
            .option("attention_type", &model.attention_type)
    }
}

#[async_trait]
impl GenerationBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn generate(&self, job: &GenerationJob) -> WorkerResult<()> {
        let mut cmd = self.command(&job.request);
        if let Some(report) = &job.profile_report {
            cmd = self.profiler.wrap(cmd, report);
        }

        self.runner
            .run(&cmd)
            .await
            .map_err(|e| WorkerError::generation(e.diagnostic()))
    }
}
