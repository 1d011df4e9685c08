use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fallout::audit::{ArtifactWriter, RunArtifact};
use fallout::config::EngineConfig;
use fallout::ensemble::Ensemble;
use fallout::registry::{resolve_workload, Registries};
use fallout::runner::WorkloadRunner;
use fallout::ui::PhaseProgress;
use fallout::workload::Workload;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fallout")]
#[command(version, about = "Distributed-systems test harness: workload execution engine")]
pub struct Cli {
    #[arg(long, global = true)]
    pub artifact_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workload to completion and print the exit verdict.
    Run {
        /// Path to a workload YAML document.
        workload: PathBuf,
        /// Path to an ensemble YAML document; defaults to an empty ensemble.
        #[arg(long)]
        ensemble: Option<PathBuf>,
        /// Override the default per-module timeout, in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Parse and resolve a workload against the built-in registry without
    /// running it; reports load errors without executing any module.
    Validate {
        workload: PathBuf,
        #[arg(long)]
        ensemble: Option<PathBuf>,
    },
}

fn load_workload(path: &PathBuf) -> Result<Workload> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read workload file {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse workload file {}", path.display()))
}

fn load_ensemble(path: &Option<PathBuf>) -> Result<Ensemble> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("failed to read ensemble file {}", path.display()))?;
            serde_yaml::from_str(&text).with_context(|| format!("failed to parse ensemble file {}", path.display()))
        }
        None => Ok(Ensemble::empty(Uuid::new_v4().to_string())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("fallout=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.artifact_dir {
        config.artifact_dir = dir;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = dir;
    }

    match cli.command {
        Commands::Run { workload, ensemble, timeout_secs } => {
            if let Some(secs) = timeout_secs {
                config = config.with_phase_timeout(std::time::Duration::from_secs(secs));
            }
            run_workload(workload, ensemble, config).await?;
        }
        Commands::Validate { workload, ensemble } => {
            validate_workload(workload, ensemble)?;
        }
    }

    Ok(())
}

async fn run_workload(workload_path: PathBuf, ensemble_path: Option<PathBuf>, config: EngineConfig) -> Result<()> {
    config.ensure_directories()?;
    let workload = load_workload(&workload_path)?;
    let ensemble = load_ensemble(&ensemble_path)?;
    let registries = Registries::with_builtins();
    let resolved = resolve_workload(&workload, &registries, &ensemble).context("failed to resolve workload")?;

    let test_run_id = ensemble.test_run_id.clone();
    let artifact_dir = config.artifact_dir.clone();
    let phase_count = resolved.phases.len() as u64;
    let runner = WorkloadRunner::new(ensemble, config).with_ui(Arc::new(PhaseProgress::new(phase_count)));
    let started_at = chrono::Utc::now();
    let (history, verdict) = runner.run(resolved).await;

    println!("verdict: {:?}", verdict.status);
    for outcome in &verdict.per_checker_diagnostics {
        println!("  [{}] valid={} {}", outcome.name, outcome.valid, outcome.diagnostic);
    }
    println!("operations: {}", verdict.operation_count);

    let writer = ArtifactWriter::new(artifact_dir);
    let artifact = RunArtifact {
        run_id: Uuid::new_v4(),
        test_run_id,
        started_at,
        ended_at: chrono::Utc::now(),
        history,
        verdict: verdict.clone(),
    };
    let path = writer.write_run(&artifact)?;
    println!("artifact written to {}", path.display());

    if !verdict.is_pass() {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_workload(workload_path: PathBuf, ensemble_path: Option<PathBuf>) -> Result<()> {
    let workload = load_workload(&workload_path)?;
    let ensemble = load_ensemble(&ensemble_path)?;
    let registries = Registries::with_builtins();
    resolve_workload(&workload, &registries, &ensemble).context("workload failed to resolve")?;
    println!("{} is a valid workload ({} instances)", workload_path.display(), workload.all_instance_names().len());
    Ok(())
}
