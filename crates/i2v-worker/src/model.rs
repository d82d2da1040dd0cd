//! Model lifecycle: a single, lazily constructed, process-wide model handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use i2v_models::{JobRequest, Resolution};

use crate::config::ModelConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Normalized parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_path: PathBuf,
    pub num_steps: u32,
    pub num_frames: u32,
    pub seed: i64,
    pub save_path: PathBuf,
    pub resolution: Resolution,
}

impl GenerationRequest {
    pub fn new(request: &JobRequest, image_path: PathBuf, save_path: PathBuf) -> Self {
        Self {
            prompt: request.prompt.clone(),
            image_path,
            num_steps: request.steps,
            num_frames: request.num_frames,
            seed: request.seed,
            save_path,
            resolution: request.resolution,
        }
    }
}

/// A loaded, device-resident generative model.
///
/// Generation does not mutate persistent model state, so a handle is shared
/// read-only across jobs.
#[async_trait]
pub trait VideoModel: Send + Sync {
    /// Generate a video and write it to `request.save_path`.
    async fn generate(&self, request: &GenerationRequest) -> WorkerResult<()>;

    /// Whether the handle can still serve requests. A dead handle is
    /// discarded and constructed again on next use.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Constructs model handles. Expensive: allocates accelerator memory and
/// loads checkpoints.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, config: &ModelConfig) -> WorkerResult<Arc<dyn VideoModel>>;
}

/// Owns the process-wide model handle.
///
/// Construction happens at most once while the handle stays alive;
/// concurrent callers wait for the in-flight construction. A failed
/// construction records no handle, and a handle that reports itself dead is
/// dropped, so the next caller starts from scratch.
pub struct ModelManager {
    config: ModelConfig,
    loader: Arc<dyn ModelLoader>,
    model: Mutex<Option<Arc<dyn VideoModel>>>,
}

impl ModelManager {
    pub fn new(config: ModelConfig, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            model: Mutex::new(None),
        }
    }

    /// Get the model handle, constructing it on first use or after the
    /// previous handle died.
    pub async fn get_model(&self) -> WorkerResult<Arc<dyn VideoModel>> {
        let mut slot = self.model.lock().await;
        if let Some(model) = slot.as_ref() {
            if model.is_alive() {
                return Ok(Arc::clone(model));
            }
            warn!("Model handle is no longer alive, reloading");
            *slot = None;
        }

        let model = self.load().await?;
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Whether a live handle is currently held.
    pub async fn is_loaded(&self) -> bool {
        self.model
            .lock()
            .await
            .as_ref()
            .is_some_and(|model| model.is_alive())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn load(&self) -> WorkerResult<Arc<dyn VideoModel>> {
        info!(
            model = %self.config.model_name,
            device = %self.config.device,
            attention = %self.config.attention_type,
            "Loading model"
        );
        let start = Instant::now();

        match self.loader.load(&self.config).await {
            Ok(model) => {
                metrics::record_model_load(true);
                info!("Model loaded in {:.2}s", start.elapsed().as_secs_f64());
                Ok(model)
            }
            Err(e) => {
                metrics::record_model_load(false);
                error!("Error loading model: {}", e);
                Err(match e {
                    WorkerError::ModelLoad(_) => e,
                    other => WorkerError::model_load(other.to_string()),
                })
            }
        }
    }
}
