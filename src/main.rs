//! Parallel Scenarios - parallel behavior-test scenario runner
//!
//! Runs every scenario of a cucumber suite in its own executor process,
//! a bounded number at a time, then merges the per-scenario result logs
//! into one report.
//!
//! ## Usage
//!
//! ```bash
//! # Run every scenario under features/ on 4 workers
//! parallel-scenarios run features --workers 4 -r features/step_definitions
//!
//! # Run one scenario
//! parallel-scenarios run features/login.feature:12
//!
//! # Skip work-in-progress scenarios, keep a JSON summary
//! parallel-scenarios run --tags '~@wip' --summary-json summary.json
//!
//! # See what would run
//! parallel-scenarios list features --detailed
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

mod cli;
mod config;
mod discovery;
mod error;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{print_env_help, ConfigFile, ConfigFormat, EnvConfig, RunnerConfig};
use discovery::{DiscoveryOptions, FeatureFinder};
use executor::ScenarioRunner;
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    init_logger(LogLevel::from_verbose(verbose));

    match args.command {
        cli::Command::Run(run_args) => {
            let exit_code = run_scenarios(run_args, &env).await?;
            std::process::exit(exit_code);
        }
        cli::Command::List(list_args) => {
            list_scenarios(list_args, &env)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
    }

    Ok(())
}

/// Defaults, then the config file, then the environment
fn load_config(explicit: Option<&PathBuf>, env: &EnvConfig) -> Result<RunnerConfig> {
    let path = explicit
        .cloned()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let file = match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ConfigFile::load(&path)?
        }
        None => ConfigFile::load_default()?,
    };

    let mut config = file.runner;
    if env.has_any() {
        debug!("Applying environment overrides");
    }
    env.apply_to(&mut config);
    Ok(config)
}

fn finder_for(config: &RunnerConfig) -> FeatureFinder {
    FeatureFinder::new(
        config.paths.clone(),
        DiscoveryOptions {
            tags: config.tags.clone(),
            name: config.name.clone(),
        },
    )
}

async fn run_scenarios(args: cli::RunArgs, env: &EnvConfig) -> Result<i32> {
    let mut config = load_config(args.config.as_ref(), env)?;
    args.apply_to(&mut config);

    info!(
        "Running scenarios from {}",
        config
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let finder = finder_for(&config);
    let report = ScenarioRunner::new(config).run(&finder).await?;
    let summary = &report.summary;
    info!(
        "{} passed, {} failed",
        output::pluralize(summary.scenarios_passed, "scenario"),
        summary.scenarios_failed
    );
    if report.exit_code == 0 && !summary.is_all_passed() {
        debug!("Every executor exited 0 but some scenarios have failed steps");
    }

    Ok(report.exit_code)
}

fn list_scenarios(args: cli::ListArgs, env: &EnvConfig) -> Result<()> {
    let mut config = load_config(args.config.as_ref(), env)?;
    if !args.paths.is_empty() {
        config.paths = args.paths;
    }
    if !args.tags.is_empty() {
        config.tags = args.tags;
    }
    if args.name.is_some() {
        config.name = args.name;
    }

    let scenarios = finder_for(&config).find()?;

    for scenario in &scenarios {
        if args.detailed {
            let kind = if scenario.outline { " (outline)" } else { "" };
            println!("{}  {}{}", scenario.target(), scenario.name, kind);
            if !scenario.tags.is_empty() {
                println!("    {}", scenario.tags.join(" "));
            }
        } else {
            println!("{}", scenario.target());
        }
    }
    println!("\n{}", output::pluralize(scenarios.len(), "scenario"));

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { format, config } => {
            let effective = ConfigFile {
                runner: load_config(config.as_ref(), env)?,
                ..Default::default()
            };
            let output = ConfigFormat::from_name(&format)?.render(&effective)?;
            println!("{output}");
        }

        cli::ConfigAction::Env => {
            env.print_summary();
            println!();
            print_env_help();
        }
    }

    Ok(())
}
