//! Profiling harness (Nsight Systems) detection and command wrapping.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::ProcessCommand;

/// Default location of the Nsight Systems CLI in CUDA images.
pub const DEFAULT_NSYS_PATH: &str = "/usr/local/cuda/bin/nsys";

/// Whether the profiling harness can be used on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilerAvailability {
    Available(PathBuf),
    Unavailable { reason: String },
}

impl ProfilerAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, ProfilerAvailability::Available(_))
    }
}

/// Wraps a child process with `nsys profile`.
#[derive(Debug, Clone)]
pub struct Profiler {
    path: PathBuf,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(DEFAULT_NSYS_PATH)
    }
}

impl Profiler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether the harness is installed and executable.
    pub fn detect(&self) -> ProfilerAvailability {
        match which::which(&self.path) {
            Ok(resolved) => {
                debug!("Profiler available at {}", resolved.display());
                ProfilerAvailability::Available(resolved)
            }
            Err(e) => ProfilerAvailability::Unavailable {
                reason: format!("{}: {}", self.path.display(), e),
            },
        }
    }

    /// Wrap `cmd` so that it runs under the profiler, writing the report
    /// to `report_path`.
    pub fn wrap(&self, cmd: ProcessCommand, report_path: &Path) -> ProcessCommand {
        cmd.wrapped_by(
            self.path.to_string_lossy(),
            [
                "profile".to_string(),
                "--output".to_string(),
                report_path.to_string_lossy().to_string(),
                "--force-overwrite".to_string(),
                "true".to_string(),
            ],
        )
    }
}
