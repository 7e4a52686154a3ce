//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::RunnerConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "PARALLEL_SCENARIOS";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker count from PARALLEL_SCENARIOS_WORKERS
    pub workers: Option<usize>,
    /// Executor from PARALLEL_SCENARIOS_EXECUTOR
    pub executor: Option<String>,
    /// Log directory from PARALLEL_SCENARIOS_LOG_DIR
    pub log_dir: Option<String>,
    /// Comma-separated support modules from PARALLEL_SCENARIOS_REQUIRES
    pub requires: Option<Vec<String>>,
    /// Comma-separated tag filter from PARALLEL_SCENARIOS_TAGS
    pub tags: Option<Vec<String>>,
    /// Inline stream from PARALLEL_SCENARIOS_INLINE_STREAM
    pub inline_stream: Option<bool>,
    /// Silent summary from PARALLEL_SCENARIOS_SILENT_SUMMARY
    pub silent_summary: Option<bool>,
    /// Config file from PARALLEL_SCENARIOS_CONFIG
    pub config_file: Option<String>,
    /// Verbose from PARALLEL_SCENARIOS_VERBOSE
    pub verbose: Option<bool>,
    /// Disables color when NO_COLOR is set
    pub no_color: bool,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            executor: get_env("EXECUTOR"),
            log_dir: get_env("LOG_DIR"),
            requires: get_env_list("REQUIRES"),
            tags: get_env_list("TAGS"),
            inline_stream: get_env_bool("INLINE_STREAM"),
            silent_summary: get_env_bool("SILENT_SUMMARY"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
            no_color: env::var_os("NO_COLOR").is_some(),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.executor.is_some()
            || self.log_dir.is_some()
            || self.requires.is_some()
            || self.tags.is_some()
            || self.inline_stream.is_some()
            || self.silent_summary.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
    }

    /// Overlay the variables that are set onto a runner configuration
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(executor) = &self.executor {
            config.executor = PathBuf::from(executor);
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = PathBuf::from(log_dir);
        }
        if let Some(requires) = &self.requires {
            config.requires = requires.clone();
        }
        if let Some(tags) = &self.tags {
            config.tags = tags.clone();
        }
        if let Some(inline_stream) = self.inline_stream {
            config.inline_stream = inline_stream;
        }
        if let Some(silent_summary) = self.silent_summary {
            config.silent_summary = silent_summary;
        }
        if self.no_color {
            config.color = false;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_WORKERS:         {:?}", ENV_PREFIX, self.workers);
        println!("  {}_EXECUTOR:        {:?}", ENV_PREFIX, self.executor);
        println!("  {}_LOG_DIR:         {:?}", ENV_PREFIX, self.log_dir);
        println!("  {}_REQUIRES:        {:?}", ENV_PREFIX, self.requires);
        println!("  {}_TAGS:            {:?}", ENV_PREFIX, self.tags);
        println!("  {}_INLINE_STREAM:   {:?}", ENV_PREFIX, self.inline_stream);
        println!("  {}_SILENT_SUMMARY:  {:?}", ENV_PREFIX, self.silent_summary);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_VERBOSE:         {:?}", ENV_PREFIX, self.verbose);
        println!("  NO_COLOR:                          {}", self.no_color);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Get comma-separated environment variable as a list
fn get_env_list(name: &str) -> Option<Vec<String>> {
    get_env(name).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all PARALLEL_SCENARIOS environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_WORKERS         Requested number of parallel workers");
    println!("  {ENV_PREFIX}_EXECUTOR        Executor program run for each scenario");
    println!("  {ENV_PREFIX}_LOG_DIR         Directory for per-scenario result logs");
    println!("  {ENV_PREFIX}_REQUIRES        Support modules, comma-separated");
    println!("  {ENV_PREFIX}_TAGS            Tag filter, comma-separated");
    println!("  {ENV_PREFIX}_INLINE_STREAM   Pass executor output through (true/false)");
    println!("  {ENV_PREFIX}_SILENT_SUMMARY  Suppress the final summary (true/false)");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE         Enable debug logging (true/false)");
    println!("  {ENV_PREFIX}_LOG             Log filter directive, e.g. parallel_scenarios=trace");
    println!("  NO_COLOR                        Disable colored output");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WORKERS=4");
    println!("  export {ENV_PREFIX}_REQUIRES=features/step_definitions");
    println!("  parallel-scenarios run features/");
}
