//! Worker configuration.
//!
//! Everything here is resolved once at process start from the environment
//! and is not re-validated per job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use i2v_media::{DEFAULT_FETCH_TIMEOUT, DEFAULT_NSYS_PATH};

/// Which generation strategy the deployment uses by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Call the resident model handle.
    #[default]
    InProcess,
    /// Launch the standalone generation program per job.
    Subprocess,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::InProcess => "in_process",
            BackendKind::Subprocess => "subprocess",
        }
    }

    /// Parse from environment variable or string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "in_process" | "in-process" | "inprocess" | "resident" => Some(Self::InProcess),
            "subprocess" | "out_of_process" | "out-of-process" | "cli" => Some(Self::Subprocess),
            _ => None,
        }
    }
}

/// A program plus the leading arguments placed before generated ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl ProgramConfig {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn from_env(program_var: &str, args_var: &str, default: ProgramConfig) -> Self {
        let program = std::env::var(program_var).unwrap_or(default.program);
        let args = std::env::var(args_var)
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or(default.args);
        Self { program, args }
    }
}

/// Construction parameters for the generative model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Model identifier passed to the model
    pub model_name: String,
    /// Directory populated by the checkpoint downloader
    pub checkpoint_dir: PathBuf,
    pub vae_checkpoint: String,
    pub text_encoder_checkpoint: String,
    pub high_noise_checkpoint: String,
    pub low_noise_checkpoint: String,
    /// Use quantized linear layers
    pub quant_linear: bool,
    /// Attention kernel implementation
    pub attention_type: String,
    /// Device selector
    pub device: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "Wan2.2-A14B".to_string(),
            checkpoint_dir: PathBuf::from("/app/checkpoints"),
            vae_checkpoint: "Wan2.1_VAE.pth".to_string(),
            text_encoder_checkpoint: "models_t5_umt5-xxl-enc-bf16.pth".to_string(),
            high_noise_checkpoint: "TurboWan2.2-I2V-A14B-high-720P-quant.pth".to_string(),
            low_noise_checkpoint: "TurboWan2.2-I2V-A14B-low-720P-quant.pth".to_string(),
            quant_linear: true,
            attention_type: "sageattention".to_string(),
            device: "cuda".to_string(),
        }
    }
}

impl ModelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_name: env_string("I2V_MODEL_NAME", defaults.model_name),
            checkpoint_dir: std::env::var("I2V_CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_dir),
            vae_checkpoint: env_string("I2V_VAE_CHECKPOINT", defaults.vae_checkpoint),
            text_encoder_checkpoint: env_string(
                "I2V_TEXT_ENCODER_CHECKPOINT",
                defaults.text_encoder_checkpoint,
            ),
            high_noise_checkpoint: env_string(
                "I2V_HIGH_NOISE_CHECKPOINT",
                defaults.high_noise_checkpoint,
            ),
            low_noise_checkpoint: env_string(
                "I2V_LOW_NOISE_CHECKPOINT",
                defaults.low_noise_checkpoint,
            ),
            quant_linear: std::env::var("I2V_QUANT_LINEAR")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.quant_linear),
            attention_type: env_string("I2V_ATTENTION_TYPE", defaults.attention_type),
            device: env_string("I2V_DEVICE", defaults.device),
        }
    }

    pub fn vae_path(&self) -> PathBuf {
        self.checkpoint_dir.join(&self.vae_checkpoint)
    }

    pub fn text_encoder_path(&self) -> PathBuf {
        self.checkpoint_dir.join(&self.text_encoder_checkpoint)
    }

    pub fn high_noise_model_path(&self) -> PathBuf {
        self.checkpoint_dir.join(&self.high_noise_checkpoint)
    }

    pub fn low_noise_model_path(&self) -> PathBuf {
        self.checkpoint_dir.join(&self.low_noise_checkpoint)
    }

    /// Every checkpoint file the model needs.
    pub fn checkpoint_paths(&self) -> [PathBuf; 4] {
        [
            self.vae_path(),
            self.text_encoder_path(),
            self.high_noise_model_path(),
            self.low_noise_model_path(),
        ]
    }

    /// Checkpoint files that are not present on disk.
    pub fn missing_checkpoints(&self) -> Vec<PathBuf> {
        self.checkpoint_paths()
            .into_iter()
            .filter(|p| !p.is_file())
            .collect()
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Default generation strategy
    pub backend: BackendKind,
    /// Directory for per-job temporary artifacts
    pub scratch_dir: PathBuf,
    /// Model construction parameters
    pub model: ModelConfig,
    /// Standalone generation program (out-of-process strategy)
    pub generator: ProgramConfig,
    /// Host program keeping the model resident (in-process strategy)
    pub model_server: ProgramConfig,
    /// Profiling harness location
    pub profiler_path: PathBuf,
    /// Reference image fetch timeout
    pub fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            scratch_dir: PathBuf::from("/tmp"),
            model: ModelConfig::default(),
            generator: ProgramConfig::new(
                "python3",
                ["/TurboDiffusion_Lib/turbodiffusion/inference/wan2.2_i2v_infer.py"],
            ),
            model_server: ProgramConfig::new("python3", ["/app/model_server.py"]),
            profiler_path: PathBuf::from(DEFAULT_NSYS_PATH),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: std::env::var("I2V_BACKEND")
                .ok()
                .and_then(|s| BackendKind::parse(&s))
                .unwrap_or(defaults.backend),
            scratch_dir: std::env::var("I2V_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            model: ModelConfig::from_env(),
            generator: ProgramConfig::from_env(
                "I2V_GENERATOR_PROGRAM",
                "I2V_GENERATOR_ARGS",
                defaults.generator,
            ),
            model_server: ProgramConfig::from_env(
                "I2V_MODEL_SERVER_PROGRAM",
                "I2V_MODEL_SERVER_ARGS",
                defaults.model_server,
            ),
            profiler_path: std::env::var("I2V_PROFILER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.profiler_path),
            fetch_timeout: Duration::from_secs(
                std::env::var("I2V_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.fetch_timeout.as_secs()),
            ),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

fn env_string(var: &str, default: String) -> String {
    std::env::var(var)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
