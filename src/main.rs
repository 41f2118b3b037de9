//! heartpc - Hardware inventory and stress-test harness
//!
//! This is a LOCAL diagnostic tool that:
//! - Lists CPU, memory, mainboard, drives, graphics adapters and OS details
//! - Runs fixed-size CPU, RAM, disk and GPU-proxy stress tests against a 30s budget
//! - Keeps a plain-text log of every run plus a separate error log
//! - Exports the raw hardware data as a flat text report

mod benchmark;
mod config;
mod diagnostic_log;
mod hardware;

use crate::benchmark::syscheck::check_system_errors;
use crate::benchmark::{BenchmarkEngine, BenchmarkKind, BenchmarkState, WorkloadProfile};
use crate::config::{Config, ProviderKind};
use crate::diagnostic_log::DiagnosticLog;
use crate::hardware::export::ExportFormatter;
use crate::hardware::inventory::commit_updates;
use crate::hardware::provider::StaticProvider;
use crate::hardware::sysinfo_provider::SysinfoProvider;
use crate::hardware::wmi::WmicProvider;
use crate::hardware::{HardwareQueryProvider, Inventory, InventoryCollector};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// heartpc - Inspect your hardware and stress-test it
#[derive(Parser)]
#[command(name = "heartpc")]
#[command(version)]
#[command(about = "Hardware inventory and stress-test harness")]
struct Cli {
    /// Replay a JSON hardware snapshot instead of querying this machine
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and display your system hardware (default)
    Detect,

    /// Run one or all stress tests
    Bench {
        #[arg(value_enum)]
        target: BenchTarget,
    },

    /// Export the raw hardware data to a text report
    Export {
        /// Report path (defaults to the configured components export path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the report with the default application afterwards
        #[arg(long, default_value_t = false)]
        open: bool,
    },

    /// Show, clear or export the test log
    Logs {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Check the system for errors (last boot time and error events)
    Check,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Print the test log
    Show,

    /// Truncate the test log
    Clear,

    /// Copy the test log to a file
    Export {
        /// Destination (defaults to the configured log export path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the exported file with the default application afterwards
        #[arg(long, default_value_t = false)]
        open: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default config file if none exists
    Init,

    /// Print the config file location
    Path,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum BenchTarget {
    Cpu,
    Ram,
    DiskWrite,
    DiskRead,
    Gpu,
    All,
}

impl BenchTarget {
    fn kinds(self) -> Vec<BenchmarkKind> {
        match self {
            BenchTarget::Cpu => vec![BenchmarkKind::Cpu],
            BenchTarget::Ram => vec![BenchmarkKind::Ram],
            BenchTarget::DiskWrite => vec![BenchmarkKind::DiskWrite],
            BenchTarget::DiskRead => vec![BenchmarkKind::DiskRead],
            BenchTarget::Gpu => vec![BenchmarkKind::Gpu],
            BenchTarget::All => BenchmarkKind::ALL.to_vec(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heartpc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    let test_log = Arc::new(DiagnosticLog::new(config.logs.log_path.clone()));
    let error_log = Arc::new(DiagnosticLog::new(config.logs.error_log_path.clone()));

    match cli.command {
        Some(Commands::Detect) | None => {
            let provider = build_provider(&config, cli.snapshot.as_deref())?;
            run_detect(provider, &error_log)?;
        }
        Some(Commands::Bench { target }) => {
            run_bench(&config, &test_log, target.kinds())?;
        }
        Some(Commands::Export { output, open }) => {
            let provider = build_provider(&config, cli.snapshot.as_deref())?;
            let path = output.unwrap_or_else(|| config.inventory.export_path.clone());
            ExportFormatter::new(provider.as_ref(), &error_log).write_report(&path)?;
            println!(
                "{} {}",
                "Components data exported to".bright_green(),
                path.display()
            );
            report_new_errors(&error_log);
            if open {
                open_file(&path);
            }
        }
        Some(Commands::Logs { command }) => match command {
            LogCommands::Show => {
                let content = test_log.read_all()?;
                if content.is_empty() {
                    println!("{}", "The log is empty.".bright_black());
                } else {
                    print!("{}", content);
                }
            }
            LogCommands::Clear => {
                test_log.clear()?;
                println!("{}", "Log cleared.".bright_green());
            }
            LogCommands::Export { output, open } => {
                let path = output.unwrap_or_else(|| config.logs.export_path.clone());
                test_log.export_to(&path)?;
                println!("{} {}", "Log exported to".bright_green(), path.display());
                if open {
                    open_file(&path);
                }
            }
        },
        Some(Commands::Check) => {
            let provider = build_provider(&config, cli.snapshot.as_deref())?;
            check_system_errors(provider.as_ref(), &test_log);
            print_log_lines(&test_log);
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init => {
                Config::init()?;
                println!(
                    "{} {}",
                    "Config written to".bright_green(),
                    Config::config_path()?.display()
                );
            }
            ConfigCommands::Path => {
                println!("{}", Config::config_path()?.display());
            }
        },
    }

    Ok(())
}

/// Pick the hardware-query provider from `--snapshot` or the config
fn build_provider(
    config: &Config,
    snapshot: Option<&Path>,
) -> Result<Arc<dyn HardwareQueryProvider>> {
    if let Some(path) = snapshot {
        tracing::info!(path = %path.display(), "replaying hardware snapshot");
        return Ok(Arc::new(StaticProvider::load(path)?));
    }

    let kind = match config.inventory.provider {
        ProviderKind::Auto if cfg!(target_os = "windows") => ProviderKind::Wmic,
        ProviderKind::Auto => ProviderKind::Sysinfo,
        other => other,
    };
    tracing::debug!(provider = ?kind, "hardware provider selected");

    Ok(match kind {
        ProviderKind::Wmic => Arc::new(WmicProvider::new()),
        _ => Arc::new(SysinfoProvider::new()),
    })
}

fn run_detect(provider: Arc<dyn HardwareQueryProvider>, error_log: &Arc<DiagnosticLog>) -> Result<()> {
    println!("{}", "Detecting hardware...".bright_cyan());

    let collector = InventoryCollector::new(provider, Arc::clone(error_log));
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let inventory = rt.block_on(async {
        let updates = collector.spawn();
        let mut inventory = Inventory::new();
        commit_updates(updates, &mut inventory).await;
        inventory
    });

    println!();
    print!("{}", inventory.display());
    if !inventory.is_finished() {
        println!(
            "{}",
            "Hardware scan stopped early; some classes may be missing.".bright_red()
        );
    }
    report_new_errors(error_log);
    Ok(())
}

fn run_bench(config: &Config, test_log: &Arc<DiagnosticLog>, kinds: Vec<BenchmarkKind>) -> Result<()> {
    let mut profile = WorkloadProfile::default();
    if let Some(dir) = &config.benchmark.scratch_dir {
        profile = profile.with_scratch_dir(dir.clone());
    }
    let engine = BenchmarkEngine::new(
        Arc::clone(test_log),
        profile,
        config.benchmark.serialize_runs,
    );

    println!(
        "{} {}",
        "Running stress tests:".bright_cyan(),
        kinds
            .iter()
            .map(|kind| kind.label())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(async {
        let (tx, mut results) = mpsc::unbounded_channel();
        for &kind in &kinds {
            engine.spawn(kind, tx.clone());
        }
        drop(tx);

        while let Some(result) = results.recv().await {
            tracing::debug!(kind = %result.kind, "result received");
            print_log_lines(test_log);
        }
    });

    let failed: Vec<&str> = kinds
        .iter()
        .filter(|&&kind| matches!(engine.state(kind), BenchmarkState::Failed(_)))
        .map(|kind| kind.label())
        .collect();
    if failed.is_empty() {
        println!("{}", "All stress tests finished.".bright_green());
    } else {
        println!(
            "{} {}",
            "Stress tests failed:".bright_red(),
            failed.join(", ")
        );
    }

    Ok(())
}

/// Print lines appended to the log since the last call
fn print_log_lines(log: &DiagnosticLog) {
    for line in log.take_unflushed() {
        let line = line.trim_end();
        if line.contains(" failed: ") || line.contains("longer than expected") {
            println!("{}", line.bright_yellow());
        } else {
            println!("{}", line);
        }
    }
}

fn report_new_errors(error_log: &DiagnosticLog) {
    let count = error_log.take_unflushed().len();
    if count > 0 {
        println!(
            "{} {} (see {})",
            count.to_string().bright_yellow(),
            "diagnostics written to the error log".bright_yellow(),
            error_log.path().display()
        );
    }
}

fn open_file(path: &Path) {
    if let Err(err) = open::that(path) {
        println!(
            "{} {}",
            "Could not open file:".bright_red(),
            err.to_string().bright_red()
        );
    }
}
