//! Process and media plumbing for the image-to-video worker.
//!
//! This crate provides:
//! - Reference image download and decoding
//! - Type-safe child process command building
//! - Child process execution with log forwarding and stderr capture
//! - Profiling harness detection and command wrapping
//! - Transport encoding of produced artifacts

pub mod command;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod profiler;

pub use command::{ProcessCommand, ProcessRunner, STDERR_TAIL_BYTES};
pub use encode::{encode_bytes, encode_file};
pub use error::{MediaError, MediaResult};
pub use fetch::{save_snapshot, ImageFetcher, DEFAULT_FETCH_TIMEOUT};
pub use image::RgbImage;
pub use profiler::{Profiler, ProfilerAvailability, DEFAULT_NSYS_PATH};
