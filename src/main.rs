use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use log::LevelFilter;
use tokio::sync::watch;

use prebuilt_matrix::cli::{exit_code_for, Cli};
use prebuilt_matrix::config::{loader, validator, MatrixConfig};
use prebuilt_matrix::error::{AppError, Result};
use prebuilt_matrix::log_collector::get_global_logs_path;
use prebuilt_matrix::orchestrator::{DockerRuntime, MatrixOrchestrator, RunFailure, RunSummary};
use prebuilt_matrix::recipe::RecipeTemplate;
use prebuilt_matrix::LogCollector;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(exit_code_for(&e));
        }
    };

    // =========================================================================
    // LOGGING INITIALIZATION - MUST BE FIRST
    // =========================================================================
    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let collector = match init_logging(&cli, level) {
        Ok(collector) => Some(collector),
        Err(e) => {
            eprintln!("[Main] WARNING: {}", e.user_message());
            // Keep diagnostics visible on stderr without the log files
            match LogCollector::stderr_only(level).install() {
                Ok(collector) => Some(collector),
                Err(e) => {
                    eprintln!("[Main] ERROR: {}", e);
                    return ExitCode::from(1);
                }
            }
        }
    };

    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!(target: "parsed", "{}", e.user_message());
            ExitCode::from(1)
        }
    };

    if let Some(collector) = collector {
        if let Err(e) = collector.wait_for_empty() {
            eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
        }
    }

    code
}

fn init_logging(cli: &Cli, level: LevelFilter) -> Result<LogCollector> {
    let log_dir = match &cli.log_dir {
        Some(dir) => dir.clone(),
        None => get_global_logs_path().map_err(AppError::Logging)?,
    };
    let collector = LogCollector::new(&log_dir, level, true)
        .and_then(LogCollector::install)
        .map_err(AppError::Logging)?;
    if let Some(path) = collector.full_log_path() {
        log::debug!("[Main] Logging to {}", path.display());
    }
    Ok(collector)
}

async fn run(cli: Cli) -> Result<()> {
    // =========================================================================
    // CONFIGURATION - resolved once, immutable afterwards
    // =========================================================================
    let mut config = match &cli.config {
        Some(path) => loader::load_config_from_file(path)?,
        None => MatrixConfig::default(),
    };
    cli.apply_overrides(&mut config)?;
    validator::validate_matrix_config(&config)?;

    let template = match &config.build.template {
        Some(path) => RecipeTemplate::from_file(path)?,
        None => RecipeTemplate::default(),
    };
    let run_config = config.run_config(cli.skip_existing, cli.dry_run);

    // =========================================================================
    // CANCELLATION - Ctrl-C kills the in-flight docker process
    // =========================================================================
    // A second interrupt exits immediately in case shutdown stalls.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            match on_interrupt(interrupts) {
                Interrupt::Cancel => {
                    log::warn!(
                        target: "parsed",
                        "[Main] Interrupt received, cancelling the current build"
                    );
                    let _ = cancel_tx.send(true);
                }
                Interrupt::Exit(code) => {
                    eprintln!("[Main] Second interrupt, exiting now");
                    std::process::exit(code);
                }
            }
        }
    });

    let runtime = Arc::new(DockerRuntime::new(
        config.build.docker_bin.clone(),
        config.build.context_dir.clone(),
        cancel_rx.clone(),
    ));
    let orchestrator =
        MatrixOrchestrator::new(runtime, template, config.artifact.clone(), run_config)
            .with_cancellation(cancel_rx);

    let result = orchestrator.run(&config.versions).await;

    let report = match &cli.report {
        Some(path) => write_report(&result, path),
        None => Ok(()),
    };

    // A build failure outranks a report failure
    match result {
        Ok(_) => report,
        Err(failure) => Err(failure.error.into()),
    }
}

fn write_report(result: &std::result::Result<RunSummary, RunFailure>, path: &Path) -> Result<()> {
    let summary = match result {
        Ok(summary) => summary,
        Err(failure) => &failure.summary,
    };
    match summary.save_to_file(path) {
        Ok(()) => {
            log::info!("[Main] Run summary written to {}", path.display());
            Ok(())
        }
        Err(e) => {
            log::error!(
                target: "parsed",
                "[Main] Failed to write run summary to {}: {}",
                path.display(),
                e
            );
            Err(e.into())
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Ask the in-flight build to stop
    Cancel,
    /// Leave without waiting for cleanup (128 + SIGINT)
    Exit(i32),
}

fn on_interrupt(count: u32) -> Interrupt {
    if count > 1 {
        Interrupt::Exit(130)
    } else {
        Interrupt::Cancel
    }
}
