//! Resident model host protocol against scripted hosts.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use i2v_models::Resolution;
use i2v_worker::{
    GenerationRequest, ModelConfig, ModelLoader, ModelManager, ProgramConfig, ResidentModelLoader,
    VideoModel, WorkerError,
};
use tempfile::TempDir;

/// Loads, announces readiness, then serves requests until stdin closes.
/// Prompts containing "explode" get an error reply.
const HOST_OK: &str = r#"
echo "loading weights"
echo '{"ready": true}'
while IFS= read -r line; do
  case "$line" in
    *explode*) echo '{"ok": false, "error": "NaN in latents"}' ;;
    *)
      out=$(printf '%s' "$line" | sed -n 's/.*"save_path":"\([^"]*\)".*/\1/p')
      echo "step 1/4"
      printf 'resident-video' > "$out"
      echo '{"ok": true}'
      ;;
  esac
done
"#;

/// Crashes on its first request ever (tracked by a marker file next to the
/// script), then behaves once restarted.
const HOST_CRASHES_ONCE: &str = r#"
marker="$(dirname "$0")/crashed"
echo '{"ready": true}'
while IFS= read -r line; do
  if [ ! -f "$marker" ]; then
    : > "$marker"
    echo "Segmentation fault" >&2
    exit 9
  fi
  out=$(printf '%s' "$line" | sed -n 's/.*"save_path":"\([^"]*\)".*/\1/p')
  printf 'resident-video' > "$out"
  echo '{"ok": true}'
done
"#;

const HOST_NOT_READY: &str = r#"
echo '{"ready": false, "error": "CUDA out of memory"}'
"#;

const HOST_DIES: &str = r#"
echo "Traceback (most recent call last)" >&2
exit 3
"#;

struct Setup {
    dir: TempDir,
    config: ModelConfig,
}

impl Setup {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig {
            checkpoint_dir: dir.path().to_path_buf(),
            ..ModelConfig::default()
        };
        for path in config.checkpoint_paths() {
            std::fs::write(path, b"weights").unwrap();
        }
        Self { dir, config }
    }

    fn loader(&self, body: &str) -> ResidentModelLoader {
        let script = self.dir.path().join("host.sh");
        std::fs::write(&script, body).unwrap();
        ResidentModelLoader::new(ProgramConfig::new("sh", [script.display().to_string()]))
    }

    fn request(&self, prompt: &str, name: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            image_path: self.dir.path().join("input.jpg"),
            num_steps: 4,
            num_frames: 81,
            seed: 0,
            save_path: self.dir.path().join(name),
            resolution: Resolution::P720,
        }
    }
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_host_serves_several_requests() {
    let setup = Setup::new();
    let model = tokio_test::assert_ok!(setup.loader(HOST_OK).load(&setup.config).await);

    for name in ["a.mp4", "b.mp4"] {
        let request = setup.request("a cat", name);
        model.generate(&request).await.unwrap();
        assert_eq!(read(&request.save_path), b"resident-video");
    }
}

#[tokio::test]
async fn test_host_error_reply_is_generation_failure() {
    let setup = Setup::new();
    let model = tokio_test::assert_ok!(setup.loader(HOST_OK).load(&setup.config).await);

    let err = model
        .generate(&setup.request("explode", "x.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Generation failed: NaN in latents");

    let request = setup.request("a cat", "after.mp4");
    model.generate(&request).await.unwrap();
    assert!(PathBuf::from(&request.save_path).exists());
}

#[tokio::test]
async fn test_host_not_ready_is_load_failure() {
    let setup = Setup::new();
    let err = setup
        .loader(HOST_NOT_READY)
        .load(&setup.config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, WorkerError::ModelLoad(_)));
    assert_eq!(err.to_string(), "Failed to load model: CUDA out of memory");
}

#[tokio::test]
async fn test_host_exit_before_ready_is_load_failure() {
    let setup = Setup::new();
    let err = setup
        .loader(HOST_DIES)
        .load(&setup.config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, WorkerError::ModelLoad(_)));
    assert!(err.to_string().contains("model host exited"));
}

#[tokio::test]
async fn test_exited_host_is_restarted_for_next_job() {
    let setup = Setup::new();
    let manager = ModelManager::new(
        setup.config.clone(),
        Arc::new(setup.loader(HOST_CRASHES_ONCE)),
    );

    let first = manager.get_model().await.unwrap();
    let err = first
        .generate(&setup.request("a cat", "crash.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Generation(_)));
    assert!(err.to_string().contains("model host exited"), "{}", err);
    assert!(!first.is_alive());
    assert!(!manager.is_loaded().await);

    let second = manager.get_model().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    let request = setup.request("a cat", "after.mp4");
    second.generate(&request).await.unwrap();
    assert_eq!(read(&request.save_path), b"resident-video");
    assert!(manager.is_loaded().await);
}
