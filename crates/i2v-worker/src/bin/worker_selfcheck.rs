use std::path::Path;

use i2v_media::command::resolve_program;
use i2v_media::Profiler;
use i2v_worker::{BackendKind, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with scratch_dir={} backend={}",
        config.scratch_dir.display(),
        config.backend.as_str()
    );
    ensure_scratch_writable(&config.scratch_dir).await?;
    ensure_checkpoints(&config)?;
    ensure_program(&config.generator.program)?;
    if config.backend == BackendKind::InProcess {
        ensure_program(&config.model_server.program)?;
    }

    let profiler = Profiler::new(&config.profiler_path);
    if profiler.detect().is_available() {
        println!("worker-selfcheck: profiler available at {}", profiler.path().display());
    } else {
        println!("worker-selfcheck: profiler not available, profiling requests will run unprofiled");
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_scratch_writable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(format!(".selfcheck-{}", std::process::id()));
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("scratch dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_checkpoints(config: &WorkerConfig) -> anyhow::Result<()> {
    let missing = config.model.missing_checkpoints();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        return Err(anyhow::anyhow!("missing checkpoints: {}", names.join(", ")));
    }
    Ok(())
}

fn ensure_program(program: &str) -> anyhow::Result<()> {
    resolve_program(program)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("{}", e))
}
