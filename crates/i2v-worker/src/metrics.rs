//! Worker metrics.
//!
//! Recorded through the `metrics` facade; the host decides whether an
//! exporter is installed.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs handled, by outcome and failing stage.
    pub const JOBS_TOTAL: &str = "i2v_jobs_total";

    /// Wall-clock generation time in seconds, by backend.
    pub const GENERATION_SECONDS: &str = "i2v_generation_seconds";

    /// Model construction attempts, by status.
    pub const MODEL_LOADS_TOTAL: &str = "i2v_model_loads_total";
}

/// Record a finished job. `stage` is `"none"` for successes.
pub fn record_job(outcome: &str, stage: &str) {
    counter!(
        names::JOBS_TOTAL,
        "outcome" => outcome.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record the duration of one generation step.
pub fn record_generation(backend: &str, seconds: f64) {
    histogram!(
        names::GENERATION_SECONDS,
        "backend" => backend.to_string()
    )
    .record(seconds);
}

/// Record a model construction attempt.
pub fn record_model_load(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(names::MODEL_LOADS_TOTAL, "status" => status).increment(1);
}
