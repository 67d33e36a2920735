//! `sweepflow`: ejecuta un barrido de parámetros desde un archivo JSON.
//!
//! Códigos de salida: 0 si todos los puntos terminan, 1 si alguno falla y 2
//! ante errores de configuración.
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sweep_adapters::builtin_registry;
use sweep_core::{FailurePolicy, FsArtifactStore, InMemoryEventStore, PointState, SweepDriver, SweepOptions, SweepReport};
use sweep_domain::WorkflowConfig;

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "sweepflow", version, about = "Parameter-sweep pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ejecuta el workflow sobre cada punto del espacio.
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Puntos en paralelo (por defecto, núcleos disponibles).
        #[arg(short, long)]
        jobs: Option<usize>,
        #[arg(long)]
        stop_on_error: bool,
        /// Reintentos por punto ante errores de ejecución.
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Tamaño mínimo (bytes) para dar por completo cualquier artifact.
        #[arg(long)]
        min_bytes: Option<u64>,
        /// Imprime el resumen por punto como JSON.
        #[arg(long)]
        json: bool,
    },
    /// Lista los nombres de job del barrido sin ejecutar nada.
    Expand {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Lista los steps registrados.
    Steps,
}

fn main() -> ExitCode {
    // .env opcional: ubicaciones de ejecutables (MG5_EXEC, DELPHES_EXEC, ...)
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config,
                       jobs,
                       stop_on_error,
                       retries,
                       min_bytes,
                       json, } => {
            let policy = if stop_on_error { FailurePolicy::StopOnError } else { FailurePolicy::Continue };
            run(&config,
                SweepOptions { parallelism: jobs,
                               policy,
                               retries },
                min_bytes,
                json)
        }
        Command::Expand { config } => expand(&config),
        Command::Steps => {
            for name in builtin_registry().names() {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
    }
}

fn load(path: &Path) -> Result<WorkflowConfig, ExitCode> {
    WorkflowConfig::from_path(path).map_err(|e| {
                                       eprintln!("[sweepflow] invalid configuration {}: {e}", path.display());
                                       ExitCode::from(EXIT_CONFIG)
                                   })
}

fn expand(path: &Path) -> ExitCode {
    let config = match load(path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    for point in config.points() {
        println!("{}", config.job_name(&point));
    }
    ExitCode::SUCCESS
}

fn run(path: &Path, options: SweepOptions, min_bytes: Option<u64>, json: bool) -> ExitCode {
    let config = match load(path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    log::info!("loaded '{}' ({} points)", config.topology, config.parameter_space.point_count());
    let driver = match SweepDriver::new(&builtin_registry(), config, InMemoryEventStore::new()) {
        Ok(d) => match min_bytes {
            Some(n) => d.with_options(options).with_store(Arc::new(FsArtifactStore::with_min_bytes(n))),
            None => d.with_options(options),
        },
        Err(e) => {
            eprintln!("[sweepflow] {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let report = match driver.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[sweepflow] {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report.summaries()) {
            Ok(text) => println!("{text}"),
            Err(e) => log::error!("cannot serialize report: {e}"),
        }
    } else {
        print_table(&report);
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    }
}

fn print_table(report: &SweepReport) {
    for point in report.points.iter().chain(report.sweep.iter()) {
        match &point.state {
            PointState::Failed { step_index, step, cause } => {
                println!("{:<40} failed at step {step_index} ({step}): {cause}", point.job_name.as_str())
            }
            other => println!("{:<40} {}", point.job_name.as_str(), other.label()),
        }
    }
    println!("run {}: {} done, {} failed, {} cancelled",
             report.run_id,
             report.done(),
             report.failed(),
             report.cancelled());
}
