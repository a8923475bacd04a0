use chrono::Utc;
use clap::{Parser, Subcommand};
use gs_problem::ProblemSnapshot;
use gs_results::FileResultStore;
use gs_sim::{SimResult, SimulationConfig, load_yaml, prepare_workspace};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridseq")]
#[command(about = "GridSeq CLI - production-cost simulation sequencing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a simulation configuration file
    Validate {
        /// Path to the simulation YAML file
        config_path: PathBuf,
    },
    /// Create a run workspace and write its manifest
    Prepare {
        /// Path to the simulation YAML file
        config_path: PathBuf,
        /// Folder the run directory is created in
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the contents of a stored problem snapshot
    ShowSnapshot {
        /// Path to a `models_json/<problem>.bin` file
        snapshot_path: PathBuf,
    },
}

fn main() -> SimResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Prepare {
            config_path,
            output,
        } => cmd_prepare(&config_path, &output),
        Commands::ShowSnapshot { snapshot_path } => cmd_show_snapshot(&snapshot_path),
    }
}

fn cmd_validate(config_path: &Path) -> SimResult<()> {
    println!("Validating simulation: {}", config_path.display());
    let config = load_yaml(config_path)?;
    print_stages(&config);
    println!("✓ Configuration is valid (run id {})", config.run_id());
    Ok(())
}

fn cmd_prepare(config_path: &Path, output: &Path) -> SimResult<()> {
    let config = load_yaml(config_path)?;
    let workspace = prepare_workspace(&config.name, output)?;
    let store = FileResultStore::new(workspace.results.clone())?;
    let manifest = config.manifest(Utc::now())?;
    store.save_manifest(&manifest)?;
    info!(run_id = %manifest.run_id, "manifest written");

    println!("✓ Workspace prepared: {}", workspace.root.display());
    println!("  raw output: {}", workspace.raw_output.display());
    println!("  models:     {}", workspace.models.display());
    println!("  results:    {}", workspace.results.display());
    print_stages(&config);
    Ok(())
}

fn cmd_show_snapshot(snapshot_path: &Path) -> SimResult<()> {
    let snapshot = ProblemSnapshot::load(snapshot_path)?;
    let settings = &snapshot.settings;

    println!("Problem: {} ({})", snapshot.name, snapshot.problem_type);
    println!("  Schema version: {}", snapshot.schema_version);
    match &snapshot.system_file {
        Some(file) => println!("  System file: {}", file.display()),
        None => println!("  System file: (none)"),
    }
    println!(
        "  Horizon: {} x {}s periods",
        settings.horizon,
        settings.resolution.seconds()
    );
    if let Some(t) = settings.initial_time {
        println!("  Initial time: {}", t.to_rfc3339());
    }
    println!("  Allow fails: {}", settings.allow_fails);
    println!("  Network: {}", snapshot.template.network);
    for (component, formulation) in &snapshot.template.devices {
        println!("    device  {component}: {formulation}");
    }
    for (service, formulation) in &snapshot.template.services {
        println!("    service {service}: {formulation}");
    }
    for dual in &snapshot.template.duals {
        println!("    dual    {dual}");
    }
    Ok(())
}

fn print_stages(config: &SimulationConfig) {
    println!(
        "  {} steps of {} minutes from {}",
        config.steps,
        config.step_minutes,
        config.initial_time.to_rfc3339()
    );
    for stage in &config.stages {
        println!(
            "  stage {} {}: {} executions/step, horizon {} x {} min, {:?}",
            stage.number,
            stage.name,
            config.executions_per_step(stage),
            stage.horizon,
            stage.resolution_minutes,
            stage.chronology
        );
    }
}
