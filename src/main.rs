//! suitepool - Process-pool test suite runner
//!
//! Runs the suites of a manifest in a bounded pool of worker processes and
//! merges every worker's results back onto the original cases.
//!
//! ## Features
//!
//! - One worker process per suite, at most `--processes` at a time
//! - Per-case exit code expectations, skips, timeouts, env and cwd
//! - Suite and case-name filtering
//! - Multiple output formats (Table, Summary, JSON, CSV)
//! - Ctrl-C terminates every running worker before reporting
//!
//! ## Usage
//!
//! ```bash
//! # Run every suite, one worker per CPU
//! suitepool run -m suites.yaml
//!
//! # Four workers, only the api suite, JSON report
//! suitepool run -m suites.yaml -p 4 -s api -f json
//!
//! # List suites and cases
//! suitepool list -m suites.yaml --detailed
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

mod cli;
mod config;
mod executor;
mod hooks;
mod models;
mod output;
mod pool;
mod utils;

use cli::Args;
use config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use executor::SuiteRunner;
use hooks::{HookChain, LogSummary, SuiteFilter};
use models::Manifest;
use output::write_report_to_file;
use utils::logger::{init_logger, LogLevel};

/// Exit status of an interrupted run
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Args {
        command,
        verbose,
        config,
    } = Args::parse();

    match command {
        cli::Command::Worker => run_worker(verbose).await,
        cli::Command::Run(run_args) => {
            let (config, _) = setup(config.as_ref(), verbose)?;
            run_suites(run_args, config).await
        }
        cli::Command::List(list_args) => {
            let (config, _) = setup(config.as_ref(), verbose)?;
            list_suites(list_args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Config(config_args) => {
            let (config, source) = setup(config.as_ref(), verbose)?;
            manage_config(config_args, &config, source)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Worker side: one suite in on stdin, one fragment out on stdout.
/// Config files are not read; only the environment sets the log level.
async fn run_worker(verbose: bool) -> Result<ExitCode> {
    let level = EnvConfig::load().log_level;
    init_logger(log_level(verbose, level.as_deref().unwrap_or("warn")));
    executor::task::serve_stdio().await?;
    Ok(ExitCode::SUCCESS)
}

/// Load layered configuration and start logging at its level
fn setup(explicit: Option<&PathBuf>, verbose: bool) -> Result<(AppConfig, Option<PathBuf>)> {
    let (config, source) = load_config(explicit)?;
    init_logger(log_level(verbose, &config.log_level));
    match &source {
        Some(path) => debug!("Loaded configuration from {}", path.display()),
        None => debug!("Using default configuration"),
    }
    Ok((config, source))
}

fn log_level(verbose: bool, configured: &str) -> LogLevel {
    if verbose {
        LogLevel::Debug
    } else {
        LogLevel::from_str(configured).unwrap_or(LogLevel::Info)
    }
}

/// File settings first, then environment overrides
fn load_config(explicit: Option<&PathBuf>) -> Result<(AppConfig, Option<PathBuf>)> {
    let env = EnvConfig::load();

    let path = explicit
        .cloned()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from))
        .or_else(ConfigFile::find);

    let mut app = match &path {
        Some(path) => ConfigFile::load(path)?.app,
        None => AppConfig::default(),
    };
    env.apply_to(&mut app);

    Ok((app, path))
}

fn manifest_path(explicit: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    explicit
        .or_else(|| config.manifest.as_ref().map(PathBuf::from))
        .context("No manifest given. Use --manifest or set 'manifest' in the config file.")
}

async fn run_suites(args: cli::RunArgs, mut config: AppConfig) -> Result<ExitCode> {
    if let Some(processes) = args.processes {
        config.processes = processes;
    }
    if let Some(timeout) = args.process_timeout {
        config.process_timeout_secs = timeout;
    }
    if let Some(format) = args.format {
        config.format = format;
    }

    let path = manifest_path(args.manifest, &config)?;
    let manifest = Manifest::load(&path)?;
    info!(
        "Loaded {} suites ({} cases) from {}",
        manifest.suites.len(),
        manifest.case_count(),
        path.display()
    );

    let colorize = !args.no_color && std::io::stdout().is_terminal();
    let options = config.run_options(colorize)?;
    let format = options.format;

    let hooks = HookChain::new()
        .with(SuiteFilter::new(args.suites, args.pattern))
        .with(LogSummary);

    let mut runner = SuiteRunner::new(options).with_hooks(hooks);
    let report = runner.run(manifest.into_suites()).await?;

    if let Some(output) = args.output {
        write_report_to_file(&output, &report, format)
            .with_context(|| format!("Failed to save report to {}", output.display()))?;
        info!("Report saved to {}", output.display());
    }

    let code = if report.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };
    Ok(code)
}

fn list_suites(args: cli::ListArgs, config: &AppConfig) -> Result<()> {
    let path = manifest_path(args.manifest, config)?;
    let manifest = Manifest::load(&path)?;

    println!(
        "\n{} suites, {} cases ({})\n",
        manifest.suites.len(),
        manifest.case_count(),
        path.display()
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for suite in &manifest.suites {
        println!("\n{} ({} cases):", suite.name, suite.len());
        println!("──────────────────────────────────────────────────────────────────────");

        for case in suite.iter() {
            if !args.detailed {
                println!("  {}", case.name);
                continue;
            }

            let mut notes = Vec::new();
            if case.expect_code != 0 {
                notes.push(format!("exit {}", case.expect_code));
            }
            if let Some(secs) = case.timeout_secs {
                notes.push(format!("timeout {secs}s"));
            }
            if let Some(reason) = &case.skip {
                notes.push(format!("skip: {reason}"));
            }

            if notes.is_empty() {
                println!("  {:24} {}", case.name, case.command_line());
            } else {
                println!(
                    "  {:24} {} [{}]",
                    case.name,
                    case.command_line(),
                    notes.join(", ")
                );
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    Ok(())
}

fn manage_config(
    args: cli::ConfigArgs,
    config: &AppConfig,
    source: Option<PathBuf>,
) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            match source {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# Defaults (no configuration file found)"),
            }
            let effective = ConfigFile {
                app: config.clone(),
                ..Default::default()
            };
            println!("{}", serde_yaml::to_string(&effective)?);
        }

        cli::ConfigAction::Env => {
            print_env_help();
            println!();
            let env = EnvConfig::load();
            if env.has_any() {
                env.print_summary();
            } else {
                println!("No SUITEPOOL_ variables are set.");
            }
        }
    }

    Ok(())
}
