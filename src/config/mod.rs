//! Configuration module
//!
//! Handles loading and managing configuration. Precedence, lowest first:
//! defaults, config file, environment, command line.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{ConfigFile, ConfigFormat};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::executor::{IoMode, WorkerOptions};

/// Runner configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Requested number of parallel workers
    pub workers: usize,

    /// Executor program invoked once per scenario
    pub executor: PathBuf,

    /// Arguments placed before the scenario target
    pub executor_args: Vec<String>,

    /// Support modules passed to the executor with `-r`
    pub requires: Vec<String>,

    /// Directory receiving one result log per scenario
    pub log_dir: PathBuf,

    /// Feature files or directories to search
    pub paths: Vec<PathBuf>,

    /// Tag filter (`@tag` keeps, `~@tag` excludes)
    pub tags: Vec<String>,

    /// Scenario name filter (substring)
    pub name: Option<String>,

    /// Let executor output pass through to the terminal
    pub inline_stream: bool,

    /// Do not print the summary at the end of the run
    pub silent_summary: bool,

    /// Colorize result lines and summary
    pub color: bool,

    /// Write the run summary as JSON to this path
    pub summary_json: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: available_workers(),
            executor: PathBuf::from("node_modules/.bin/cucumber-js"),
            executor_args: Vec::new(),
            requires: Vec::new(),
            log_dir: PathBuf::from("logs"),
            paths: vec![PathBuf::from("features")],
            tags: Vec::new(),
            name: None,
            inline_stream: false,
            silent_summary: false,
            color: true,
            summary_json: None,
        }
    }
}

impl RunnerConfig {
    /// Options handed to every worker
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            executor: self.executor.clone(),
            executor_args: self.executor_args.clone(),
            log_dir: self.log_dir.clone(),
            requires: self.requires.clone(),
            io_mode: if self.inline_stream {
                IoMode::Inherit
            } else {
                IoMode::Captured
            },
        }
    }

    /// Dispatch settings, with the worker budget resolved against the host
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::resolve(self.workers)
            .silent_summary(self.silent_summary)
            .color(self.color)
    }
}

/// Settings fixed for the lifetime of one dispatcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Effective worker budget, `min(requested, available)` and at least one
    pub workers: usize,

    pub silent_summary: bool,

    pub color: bool,
}

impl DispatchConfig {
    /// Resolve the budget against the host's available parallelism
    pub fn resolve(requested: usize) -> Self {
        Self::with_available(requested, available_workers())
    }

    pub fn with_available(requested: usize, available: usize) -> Self {
        Self {
            workers: requested.min(available).max(1),
            silent_summary: false,
            color: true,
        }
    }

    pub fn silent_summary(mut self, silent: bool) -> Self {
        self.silent_summary = silent;
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

/// Number of CPUs the host makes available to this process
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
