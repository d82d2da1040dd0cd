//! Serverless image-to-video job handler.
//!
//! This crate provides:
//! - Job orchestration from raw job body to result or error response
//! - Lazy, at-most-once model construction
//! - In-process and subprocess generation backends with optional profiling
//! - Per-job artifact management with guaranteed cleanup

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod resident;

pub use backend::{Dispatcher, GenerationBackend, GenerationJob, InProcessBackend, SubprocessBackend};
pub use config::{BackendKind, ModelConfig, ProgramConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use handler::JobHandler;
pub use logging::{JobLogger, Stage};
pub use model::{GenerationRequest, ModelLoader, ModelManager, VideoModel};
pub use resident::ResidentModelLoader;
