//! Run entry point
//!
//! Ties discovery, the dispatcher and reporting together for one run.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::discovery::ScenarioSource;
use crate::error::RunError;
use crate::output::RunSummary;
use crate::utils::Timer;

use super::dispatcher::ScenarioDispatcher;

/// What a run returns to its caller
#[derive(Debug)]
pub struct RunReport {
    pub exit_code: i32,
    pub summary: RunSummary,
}

/// Runs every scenario of a source in parallel
pub struct ScenarioRunner {
    config: RunnerConfig,
    handle_ctrl_c: bool,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            handle_ctrl_c: true,
        }
    }

    /// Do not cancel the run on Ctrl-C
    #[cfg(test)]
    pub fn without_ctrl_c(mut self) -> Self {
        self.handle_ctrl_c = false;
        self
    }

    pub async fn run(&self, source: &impl ScenarioSource) -> Result<RunReport> {
        let timer = Timer::start("run");
        let dispatch = self.config.dispatch_config();
        let options = self.config.worker_options();

        info!(
            "Executor: {} {}",
            options.executor.display(),
            options.executor_args.join(" ")
        );
        info!(
            "Workers: {} (requested {}), log dir: {}",
            dispatch.workers,
            self.config.workers,
            options.log_dir.display()
        );
        if !options.requires.is_empty() {
            info!("Support modules: {}", options.requires.join(", "));
        }

        let scenarios = source
            .discover()
            .await
            .map_err(|e| RunError::Discovery(format!("{e:#}")))?;

        if scenarios.is_empty() {
            warn!("No scenarios matched");
        } else {
            info!("Found {} scenarios", scenarios.len());
        }

        tokio::fs::create_dir_all(&options.log_dir)
            .await
            .map_err(|source| RunError::LogDir {
                path: options.log_dir.clone(),
                source,
            })?;

        let mut dispatcher = ScenarioDispatcher::new(dispatch, options);
        dispatcher.start(scenarios);
        debug!("{} workers started", dispatcher.active_count());

        let ctrl_c = self.handle_ctrl_c.then(|| {
            let switch = dispatcher.kill_switch();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping workers");
                    switch.kill();
                }
            })
        });

        let outcome = dispatcher.await_completion().await;
        if let Some(task) = ctrl_c {
            task.abort();
        }

        if outcome.cancelled {
            warn!(
                "Run cancelled, {} scenarios never started",
                outcome.unstarted
            );
        }
        if !outcome.summary.is_all_passed() {
            warn!(
                "{} of {} scenarios failed",
                outcome.summary.scenarios_failed, outcome.summary.scenarios
            );
        }
        if let Ok(merge) = &outcome.merge {
            if merge.skipped > 0 {
                warn!("{} result logs could not be merged", merge.skipped);
            }
        }

        if let Some(path) = &self.config.summary_json {
            let json = serde_json::to_string_pretty(&outcome.summary)
                .context("Failed to serialize run summary")?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            info!("Summary written to {}", path.display());
        }
        outcome.merge?;

        let elapsed = timer.stop();
        info!(
            "Run finished in {}ms with exit code {}",
            elapsed.as_millis(),
            outcome.exit_code
        );

        Ok(RunReport {
            exit_code: outcome.exit_code,
            summary: outcome.summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScenarioDescriptor;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(log_dir: PathBuf) -> RunnerConfig {
        RunnerConfig {
            workers: 2,
            log_dir,
            silent_summary: true,
            color: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_source_succeeds() {
        let dir = tempdir().unwrap();
        let runner = ScenarioRunner::new(config(dir.path().join("logs"))).without_ctrl_c();

        let report = runner.run(&Vec::<ScenarioDescriptor>::new()).await.unwrap();
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.summary.scenarios, 0);
        assert!(dir.path().join("logs/merged/results.json").exists());
    }

    #[tokio::test]
    async fn test_log_dir_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let runner = ScenarioRunner::new(config(blocker.join("logs"))).without_ctrl_c();
        let err = runner.run(&Vec::<ScenarioDescriptor>::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::LogDir { .. })
        ));
    }

    #[tokio::test]
    async fn test_discovery_failure() {
        let dir = tempdir().unwrap();
        let runner = ScenarioRunner::new(config(dir.path().join("logs"))).without_ctrl_c();
        let finder = crate::discovery::FeatureFinder::new(
            vec![dir.path().join("missing.feature")],
            Default::default(),
        );

        let err = runner.run(&finder).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::Discovery(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_writes_summary_json() {
        use crate::executor::test_support::{script, WRITE_PASSING};

        let dir = tempdir().unwrap();
        let exe = script(dir.path(), "exec.sh", WRITE_PASSING);
        let summary_path = dir.path().join("summary.json");

        let mut cfg = config(dir.path().join("logs"));
        cfg.executor = exe;
        cfg.summary_json = Some(summary_path.clone());

        let scenarios = vec![
            ScenarioDescriptor::new("features/a.feature", 3),
            ScenarioDescriptor::new("features/b.feature", 5),
        ];
        let report = ScenarioRunner::new(cfg)
            .without_ctrl_c()
            .run(&scenarios)
            .await
            .unwrap();

        assert_eq!(report.exit_code, 0);
        assert_eq!(report.summary.scenarios_passed, 2);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(json["scenarios"], 2);
        assert_eq!(json["step_statuses"]["passed"], 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_merge_failure_still_writes_summary_json() {
        use crate::executor::test_support::{script, WRITE_PASSING};

        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("merged"), "").unwrap();
        let exe = script(dir.path(), "exec.sh", WRITE_PASSING);
        let summary_path = dir.path().join("summary.json");

        let mut cfg = config(logs);
        cfg.executor = exe;
        cfg.summary_json = Some(summary_path.clone());

        let scenarios = vec![ScenarioDescriptor::new("features/a.feature", 3)];
        let err = ScenarioRunner::new(cfg)
            .without_ctrl_c()
            .run(&scenarios)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::Merge { .. })
        ));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(json["scenarios"], 1);
        assert_eq!(json["scenarios_passed"], 1);
    }
}
