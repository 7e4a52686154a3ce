//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunnerConfig;

/// Parallel behavior-test scenario runner
#[derive(Parser, Debug)]
#[command(name = "parallel-scenarios")]
#[command(version)]
#[command(about = "Run cucumber scenarios in parallel, one executor process per scenario")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run scenarios in parallel
    Run(RunArgs),

    /// List the scenarios a run would execute
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Feature files or directories (`file.feature:LINE` selects one scenario)
    pub paths: Vec<PathBuf>,

    /// Number of parallel workers (capped at the number of CPUs)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Executor program run once per scenario
    #[arg(short, long)]
    pub executor: Option<PathBuf>,

    /// Extra argument placed before the scenario target (repeatable)
    #[arg(long = "executor-arg", allow_hyphen_values = true)]
    pub executor_args: Vec<String>,

    /// Support module passed to the executor (repeatable)
    #[arg(short = 'r', long = "require")]
    pub requires: Vec<String>,

    /// Directory for per-scenario result logs
    #[arg(short, long)]
    pub log_dir: Option<PathBuf>,

    /// Tag filter, `~@tag` excludes (repeatable)
    #[arg(short, long)]
    pub tags: Vec<String>,

    /// Only run scenarios whose name contains this text
    #[arg(short, long)]
    pub name: Option<String>,

    /// Let executor output pass through to the terminal
    #[arg(long)]
    pub inline_stream: bool,

    /// Do not print the run summary
    #[arg(long)]
    pub silent_summary: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Configuration file (default: first of the standard locations)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay the flags that were given onto a configuration
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if !self.paths.is_empty() {
            config.paths = self.paths.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(executor) = &self.executor {
            config.executor = executor.clone();
        }
        if !self.executor_args.is_empty() {
            config.executor_args = self.executor_args.clone();
        }
        if !self.requires.is_empty() {
            config.requires = self.requires.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if !self.tags.is_empty() {
            config.tags = self.tags.clone();
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }
        if self.inline_stream {
            config.inline_stream = true;
        }
        if self.silent_summary {
            config.silent_summary = true;
        }
        if self.no_color {
            config.color = false;
        }
        if let Some(path) = &self.summary_json {
            config.summary_json = Some(path.clone());
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Feature files or directories
    pub paths: Vec<PathBuf>,

    /// Tag filter, `~@tag` excludes (repeatable)
    #[arg(short, long)]
    pub tags: Vec<String>,

    /// Only list scenarios whose name contains this text
    #[arg(short, long)]
    pub name: Option<String>,

    /// Show names and tags
    #[arg(short, long)]
    pub detailed: bool,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "parallel-scenarios.yaml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::parse_from([
            "parallel-scenarios",
            "run",
            "features/login.feature",
            "-w",
            "3",
            "-r",
            "steps",
            "-r",
            "support",
            "--executor-arg",
            "--fail-fast",
            "--tags",
            "~@wip",
            "--no-color",
        ]);

        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.paths, vec![PathBuf::from("features/login.feature")]);
        assert_eq!(run.workers, Some(3));
        assert_eq!(run.requires, vec!["steps", "support"]);
        assert_eq!(run.executor_args, vec!["--fail-fast"]);

        let mut config = RunnerConfig::default();
        run.apply_to(&mut config);
        assert_eq!(config.workers, 3);
        assert_eq!(config.tags, vec!["~@wip"]);
        assert!(!config.color);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_parse_config_actions() {
        let args = Args::parse_from(["parallel-scenarios", "-v", "config", "env"]);
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Config(ConfigArgs {
                action: ConfigAction::Env
            })
        ));
    }
}
