//! Image-to-video worker binary.
//!
//! Reads one job per line from stdin (or a single job from a test input
//! file) and writes one JSON response line per job to stdout. Logs go to
//! stderr.

use std::path::PathBuf;

use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use i2v_worker::{JobHandler, WorkerConfig};

const DEFAULT_TEST_INPUT: &str = "test_input.json";

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting i2v-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Checkpoints are provisioned at build time; their absence is a deploy fault.
    let missing = config.model.missing_checkpoints();
    if !missing.is_empty() {
        for path in &missing {
            error!("Required checkpoint not found: {}", path.display());
        }
        std::process::exit(1);
    }

    let handler = match JobHandler::from_config(&config) {
        Ok(h) => h,
        Err(e) => {
            error!("Failed to create job handler: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        backend = handler.dispatcher().default_backend(),
        "Job handler ready"
    );

    let result = match test_input_path() {
        Some(path) => run_test_input(&handler, path).await,
        None => run_stdin(&handler).await,
    };
    if let Err(e) = result {
        error!("Worker error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("i2v=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn test_input_path() -> Option<PathBuf> {
    match std::env::var("I2V_TEST_INPUT") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from(DEFAULT_TEST_INPUT);
            default.is_file().then_some(default)
        }
    }
}

async fn run_test_input(handler: &JobHandler, path: PathBuf) -> anyhow::Result<()> {
    info!("Running test input from {}", path.display());
    let body = tokio::fs::read_to_string(&path).await?;
    let response = handler.handle_line(&body).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn run_stdin(handler: &JobHandler) -> anyhow::Result<()> {
    handler
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}
