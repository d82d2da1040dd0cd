//! Resident model host.
//!
//! The production model handle keeps the model loaded in a long-lived host
//! process started once per worker. Requests and replies are single lines
//! of JSON over the host's stdio:
//!
//! - after loading, the host prints `{"ready": true}` (or
//!   `{"ready": false, "error": "..."}`)
//! - each request is a serialized [`GenerationRequest`]
//! - each reply is `{"ok": true}` or `{"ok": false, "error": "..."}`
//!
//! Lines that are not JSON objects are treated as host log output.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use i2v_media::command::resolve_program;
use i2v_media::ProcessCommand;

use crate::config::{ModelConfig, ProgramConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::model::{GenerationRequest, ModelLoader, VideoModel};

/// Reply line from the host.
#[derive(Debug, Default, Deserialize)]
struct HostReply {
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// Starts the resident model host.
#[derive(Debug, Clone)]
pub struct ResidentModelLoader {
    program: ProgramConfig,
}

impl ResidentModelLoader {
    pub fn new(program: ProgramConfig) -> Self {
        Self { program }
    }

    /// Host command line for `config`.
    pub fn command(&self, config: &ModelConfig) -> ProcessCommand {
        ProcessCommand::new(&self.program.program)
            .args(self.program.args.iter().cloned())
            .option("model", &config.model_name)
            .option("vae_path", config.vae_path().display())
            .option("text_encoder_path", config.text_encoder_path().display())
            .option("high_noise_model_path", config.high_noise_model_path().display())
            .option("low_noise_model_path", config.low_noise_model_path().display())
            .option("attention_type", &config.attention_type)
            .option("device", &config.device)
            .flag("quant_linear", config.quant_linear)
    }
}

#[async_trait]
impl ModelLoader for ResidentModelLoader {
    async fn load(&self, config: &ModelConfig) -> WorkerResult<Arc<dyn VideoModel>> {
        let missing = config.missing_checkpoints();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(WorkerError::model_load(format!(
                "missing checkpoint files: {}",
                names.join(", ")
            )));
        }

        let cmd = self.command(config);
        let program = resolve_program(cmd.program())
            .map_err(|e| WorkerError::model_load(e.to_string()))?;
        debug!("Starting model host: {}", cmd.display());

        let mut child = Command::new(program)
            .args(cmd.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::model_load(format!("failed to start model host: {}", e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(WorkerError::model_load("model host stdio not captured"));
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = "model_host", "{}", line);
                }
            });
        }

        let mut host = HostIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        match host.read_reply().await {
            Some(HostReply {
                ready: Some(true), ..
            }) => {
                info!("Model host ready");
                Ok(Arc::new(ResidentModel {
                    host: Mutex::new(host),
                }))
            }
            Some(reply) => Err(WorkerError::model_load(
                reply
                    .error
                    .unwrap_or_else(|| "model host reported not ready".to_string()),
            )),
            None => Err(WorkerError::model_load(host.exit_description().await)),
        }
    }
}

struct HostIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl HostIo {
    /// Next JSON reply, skipping log lines. `None` on end of output.
    async fn read_reply(&mut self) -> Option<HostReply> {
        loop {
            let line = match self.stdout.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Failed to read from model host: {}", e);
                    return None;
                }
            };
            let trimmed = line.trim();
            if trimmed.starts_with('{') {
                if let Ok(reply) = serde_json::from_str::<HostReply>(trimmed) {
                    return Some(reply);
                }
            }
            if !trimmed.is_empty() {
                info!(process = "model_host", "{}", trimmed);
            }
        }
    }

    async fn send(&mut self, request: &GenerationRequest) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(request).map_err(std::io::Error::other)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await
    }

    async fn exit_description(&mut self) -> String {
        match self.child.wait().await {
            Ok(status) => format!("model host exited ({})", status),
            Err(e) => format!("model host stopped responding: {}", e),
        }
    }
}

/// Model handle backed by the resident host process.
pub struct ResidentModel {
    host: Mutex<HostIo>,
}

#[async_trait]
impl VideoModel for ResidentModel {
    async fn generate(&self, request: &GenerationRequest) -> WorkerResult<()> {
        let mut host = self.host.lock().await;

        if let Err(e) = host.send(request).await {
            return Err(WorkerError::generation(format!(
                "failed to send request to model host: {}",
                e
            )));
        }

        match host.read_reply().await {
            Some(HostReply { ok: Some(true), .. }) => Ok(()),
            Some(reply) => Err(WorkerError::generation(
                reply
                    .error
                    .unwrap_or_else(|| "model host returned no result".to_string()),
            )),
            None => Err(WorkerError::generation(host.exit_description().await)),
        }
    }

    fn is_alive(&self) -> bool {
        // A busy host is serving a request.
        let Ok(mut host) = self.host.try_lock() else {
            return true;
        };
        match host.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("Model host has exited ({})", status);
                false
            }
            Err(e) => {
                warn!("Failed to poll model host: {}", e);
                false
            }
        }
    }
}
