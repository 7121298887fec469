//! `armobs` – ArmObs command line interface.
//!
//! Builds task observations outside the control loop, which is how frame and
//! quaternion conventions get checked before a policy ever sees them.
//!
//! ```text
//! armobs init   --config armobs.toml
//! armobs build  --config armobs.toml --goal goal.json [--state state.json]
//! armobs verify --config armobs.toml --reference trajectory.jsonl [--tolerance 1e-5]
//! ```
//!
//! Structured logs go to stderr (see `armobs_runtime::telemetry`); command
//! results go to stdout.

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use armobs_hal::{ReplayStateSource, SimStateSource, StateSource};
use armobs_runtime::reference::{DEFAULT_TOLERANCE, Mismatch, load_reference, verify};
use armobs_runtime::{TaskContext, TaskObservation};
use armobs_types::{GoalPose, RobotState};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::de::DeserializeOwned;
use tracing::info;

use config::TaskFile;

#[derive(Parser)]
#[command(name = "armobs", version)]
#[command(about = "Build and verify robot-arm task observations", long_about = None)]
struct Cli {
    /// Task file (defaults to `$ARMOBS_CONFIG` or `./armobs.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default task file if none exists
    Init,

    /// Build one observation and print it as JSON
    Build {
        /// Goal pose JSON file
        #[arg(long)]
        goal: PathBuf,

        /// Robot state JSON file; a zeroed simulated arm when omitted
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Replay a reference trajectory and compare observations
    Verify {
        /// JSON-lines reference trajectory
        #[arg(long)]
        reference: PathBuf,

        /// Absolute per-element tolerance
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
}

fn main() -> ExitCode {
    let telemetry = armobs_runtime::init_tracing("armobs");
    if telemetry.is_exporting() {
        info!("exporting spans over OTLP");
    }
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    let result = match cli.command {
        Commands::Init => run_init(&config_path),
        Commands::Build { goal, state } => run_build(&config_path, &goal, state.as_deref()),
        Commands::Verify {
            reference,
            tolerance,
        } => run_verify(&config_path, &reference, tolerance),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run_init(path: &Path) -> Result<ExitCode, String> {
    if path.exists() {
        eprintln!(
            "  {} {} already exists, leaving it untouched",
            "•".yellow(),
            path.display().to_string().bold()
        );
        return Ok(ExitCode::SUCCESS);
    }
    config::save_to(&TaskFile::default(), path)?;
    eprintln!(
        "  {} Task file written to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_build(config_path: &Path, goal: &Path, state: Option<&Path>) -> Result<ExitCode, String> {
    let task = load_task(config_path)?;
    let goal: GoalPose = read_json(goal)?;

    let mut source: Box<dyn StateSource> = match state {
        Some(path) => {
            let state: RobotState = read_json(path)?;
            Box::new(ReplayStateSource::new("cli", [state]))
        }
        None => Box::new(SimStateSource::new("cli_sim")),
    };

    let (obs, _) = task
        .build_observation(&goal, source.as_mut())
        .map_err(|e| e.to_string())?;
    info!(source = source.id(), len = obs.len(), "observation built");

    let json = serde_json::to_string_pretty(&obs).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn run_verify(config_path: &Path, reference: &Path, tolerance: f64) -> Result<ExitCode, String> {
    let task = load_task(config_path)?;
    let records = load_reference(reference).map_err(|e| e.to_string())?;
    let report = verify(&task, &records, tolerance);

    for m in &report.mismatches {
        let detail = match &m.mismatch {
            Mismatch::Length { expected, actual } => {
                format!("length {actual}, expected {expected}")
            }
            Mismatch::Values {
                max_abs_error,
                worst_index,
            } => format!("max error {max_abs_error:.3e} at index {worst_index}"),
            Mismatch::Build { error } => format!("build failed: {error}"),
        };
        eprintln!("  {} record {}: {}", "✗".red().bold(), m.record, detail);
    }

    if report.is_ok() {
        eprintln!(
            "  {} {} record(s) within {:.1e} (max error {:.3e})",
            "✓".green().bold(),
            report.records,
            report.tolerance,
            report.max_abs_error
        );
    } else {
        eprintln!(
            "  {} {} of {} record(s) diverged",
            "✗".red().bold(),
            report.mismatches.len(),
            report.records
        );
    }

    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Load the task file (or the default one) and construct its task.
fn load_task(path: &Path) -> Result<TaskObservation, String> {
    let file = match config::load_from(path)? {
        Some(file) => {
            info!(path = %path.display(), "task file loaded");
            file
        }
        None => {
            info!(path = %path.display(), "no task file, using defaults");
            let mut file = TaskFile::default();
            config::apply_env_overrides(&mut file);
            file
        }
    };

    let ctx = TaskContext::new(file.run, file.instance, file.in_sequence, file.extras)
        .map_err(|e| e.to_string())?;
    TaskObservation::new(ctx).map_err(|e| e.to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}
