//! In-process strategy: call the resident model handle directly.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{GenerationBackend, GenerationJob};
use crate::error::{WorkerError, WorkerResult};
use crate::model::ModelManager;

pub struct InProcessBackend {
    manager: Arc<ModelManager>,
}

impl InProcessBackend {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }
}

#[async_trait]
impl GenerationBackend for InProcessBackend {
    fn name(&self) -> &'static str {
        "in_process"
    }

    async fn prepare(&self) -> WorkerResult<()> {
        self.manager.get_model().await.map(|_| ())
    }

    async fn generate(&self, job: &GenerationJob) -> WorkerResult<()> {
        let model = self.manager.get_model().await?;
        debug!(save_path = %job.request.save_path.display(), "Calling model");

        model.generate(&job.request).await.map_err(|e| match e {
            WorkerError::Generation(_) => e,
            other => WorkerError::generation(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::model::{GenerationRequest, ModelLoader, VideoModel};
    use std::path::PathBuf;

    struct FailingModel;

    #[async_trait]
    impl VideoModel for FailingModel {
        async fn generate(&self, _request: &GenerationRequest) -> WorkerResult<()> {
            Err(WorkerError::Io(std::io::Error::other("CUDA error: out of memory")))
        }
    }

    struct FailingModelLoader;

    #[async_trait]
    impl ModelLoader for FailingModelLoader {
        async fn load(&self, _config: &ModelConfig) -> WorkerResult<Arc<dyn VideoModel>> {
            Ok(Arc::new(FailingModel))
        }
    }

    #[tokio::test]
    async fn test_model_fault_becomes_generation_error() {
        let manager = Arc::new(ModelManager::new(
            ModelConfig::default(),
            Arc::new(FailingModelLoader),
        ));
        let backend = InProcessBackend::new(manager);
        backend.prepare().await.unwrap();

        let job = GenerationJob {
            request: GenerationRequest {
                prompt: "a cat".into(),
                image_path: PathBuf::from("/tmp/in.jpg"),
                num_steps: 4,
                num_frames: 81,
                seed: 0,
                save_path: PathBuf::from("/tmp/out.mp4"),
                resolution: Default::default(),
            },
            profile_report: None,
        };
        let err = backend.generate(&job).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Generation failed: IO error: CUDA error: out of memory"
        );
    }
}
