//! Per-job temporary artifacts and output packaging.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use i2v_media::encode_file;
use i2v_models::ProfileReport;

use crate::error::{WorkerError, WorkerResult};

/// Paths of every temporary file a job may create.
///
/// Names embed a per-job UUID so jobs sharing a scratch directory never
/// collide. Whatever is still on disk when the scratch is dropped gets
/// removed.
#[derive(Debug)]
pub struct JobScratch {
    input_image: PathBuf,
    output_video: PathBuf,
    profile_report: PathBuf,
}

impl JobScratch {
    /// Allocate artifact paths under `dir`, creating the directory.
    pub async fn create(dir: &Path) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let id = Uuid::new_v4();
        Ok(Self {
            input_image: dir.join(format!("input_{}.jpg", id)),
            output_video: dir.join(format!("video_{}.mp4", id)),
            profile_report: dir.join(format!("profile_{}.nsys-rep", id)),
        })
    }

    pub fn input_image(&self) -> &Path {
        &self.input_image
    }

    pub fn output_video(&self) -> &Path {
        &self.output_video
    }

    pub fn profile_report(&self) -> &Path {
        &self.profile_report
    }

    fn paths(&self) -> [&Path; 3] {
        [
            self.input_image.as_path(),
            self.output_video.as_path(),
            self.profile_report.as_path(),
        ]
    }

    /// Delete every artifact that still exists.
    pub async fn cleanup(&self) {
        for path in self.paths() {
            remove_artifact(path).await;
        }
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        for path in self.paths() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed leftover artifact {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
            }
        }
    }
}

/// Encoded outputs of a job.
#[derive(Debug, Clone)]
pub struct PackagedArtifacts {
    pub video_base64: String,
    pub profile: Option<ProfileReport>,
}

/// Read, encode and delete the outputs of a generation.
///
/// The input snapshot is deleted before returning whether or not packaging
/// succeeded.
pub async fn package(
    scratch: &JobScratch,
    profile_report: Option<&Path>,
) -> WorkerResult<PackagedArtifacts> {
    let result = encode_outputs(scratch.output_video(), profile_report).await;
    remove_artifact(scratch.input_image()).await;
    result
}

async fn encode_outputs(
    output_video: &Path,
    profile_report: Option<&Path>,
) -> WorkerResult<PackagedArtifacts> {
    if !tokio::fs::try_exists(output_video).await.unwrap_or(false) {
        return Err(WorkerError::MissingOutput);
    }

    let video_base64 = encode_file(output_video)
        .await
        .map_err(|e| WorkerError::packaging(e.to_string()))?;
    remove_artifact(output_video).await;

    let profile = match profile_report {
        Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
            let base64 = encode_file(path)
                .await
                .map_err(|e| WorkerError::packaging(e.to_string()))?;
            remove_artifact(path).await;
            Some(ProfileReport {
                base64,
                filename: file_name(path),
            })
        }
        Some(path) => {
            warn!("Profiling report {} was not produced", path.display());
            None
        }
        None => None,
    };

    Ok(PackagedArtifacts {
        video_base64,
        profile,
    })
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed artifact {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
