//! Streaming result aggregation
//!
//! Accumulates scenario results as they arrive, in any order, into run-wide counters.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::models::{ResultRecord, StepStatus};

use super::formatter::ResultFormatter;

/// Scenario pass/fail tally
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioTally {
    pub passed: usize,
    pub failed: usize,
}

/// Running counters for one run
#[derive(Clone, Debug, Default)]
pub struct RunCounters {
    pub total_steps: usize,
    pub total_scenarios: usize,

    /// Sum of all scenario durations, i.e. the serial cost of the run
    pub total_duration: Duration,

    pub step_statuses: BTreeMap<StepStatus, usize>,
    pub scenario_statuses: ScenarioTally,

    /// `<file>:<line>` of every failed scenario
    pub failed_scenarios: Vec<String>,

    /// Text of every distinct undefined step
    pub undefined_steps: Vec<String>,
}

/// Read-only snapshot of a run's counters
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub scenarios: usize,
    pub scenarios_passed: usize,
    pub scenarios_failed: usize,
    pub steps: usize,
    pub step_statuses: BTreeMap<StepStatus, usize>,

    #[serde(rename = "serial_duration_ms", serialize_with = "as_millis")]
    pub serial_duration: Duration,

    #[serde(rename = "wall_clock_ms", serialize_with = "as_millis")]
    pub wall_clock: Duration,

    /// Serial over wall-clock time; `None` when at most one worker ran
    pub speedup: Option<f64>,

    pub parallelism: usize,
    pub failed_scenarios: Vec<String>,
    pub undefined_steps: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn is_all_passed(&self) -> bool {
        self.scenarios_failed == 0
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Accumulates results for exactly one run
#[derive(Debug)]
pub struct ResultAggregator {
    counters: RunCounters,
    formatter: ResultFormatter,
    start: Instant,
    started_at: DateTime<Utc>,
    end: Option<(Instant, DateTime<Utc>)>,
    parallelism: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            counters: RunCounters::default(),
            formatter: ResultFormatter::new(),
            start: Instant::now(),
            started_at: Utc::now(),
            end: None,
            parallelism: 1,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.formatter = self.formatter.no_color();
        self
    }

    #[cfg(test)]
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Record how many workers ran concurrently
    pub fn set_parallelism(&mut self, workers: usize) {
        self.parallelism = workers;
    }

    /// Fold one scenario result into the counters and describe it in one line
    pub fn handle_result(&mut self, record: &ResultRecord) -> String {
        let counters = &mut self.counters;
        counters.total_scenarios += 1;
        counters.total_duration += record.duration;

        let mut passed = record.exit_code == 0;
        let mut failed_step = None;

        match (&record.error, &record.results) {
            (None, Some(feature)) => {
                for step in feature.steps() {
                    let status = step.result.status;
                    counters.total_steps += 1;
                    *counters.step_statuses.entry(status).or_insert(0) += 1;

                    if status.fails_scenario() {
                        passed = false;
                        failed_step.get_or_insert_with(|| step.text());
                    }

                    if status == StepStatus::Undefined {
                        let text = step.text();
                        if !counters.undefined_steps.contains(&text) {
                            counters.undefined_steps.push(text);
                        }
                    }
                }
            }
            _ => passed = false,
        }

        if passed {
            counters.scenario_statuses.passed += 1;
        } else {
            counters.scenario_statuses.failed += 1;
            counters.failed_scenarios.push(record.scenario.target());
        }

        self.formatter
            .format_result(record, passed, failed_step.as_deref())
    }

    /// Record wall-clock completion of the run
    pub fn set_end_time(&mut self) {
        self.end = Some((Instant::now(), Utc::now()));
    }

    pub fn summary(&self) -> RunSummary {
        let counters = &self.counters;
        let wall_clock = match self.end {
            Some((end, _)) => end.duration_since(self.start),
            None => self.start.elapsed(),
        };

        let speedup = if self.parallelism > 1 && !wall_clock.is_zero() {
            Some(counters.total_duration.as_secs_f64() / wall_clock.as_secs_f64())
        } else {
            None
        };

        RunSummary {
            scenarios: counters.total_scenarios,
            scenarios_passed: counters.scenario_statuses.passed,
            scenarios_failed: counters.scenario_statuses.failed,
            steps: counters.total_steps,
            step_statuses: counters.step_statuses.clone(),
            serial_duration: counters.total_duration,
            wall_clock,
            speedup,
            parallelism: self.parallelism,
            failed_scenarios: counters.failed_scenarios.clone(),
            undefined_steps: counters.undefined_steps.clone(),
            started_at: self.started_at,
            finished_at: self.end.map(|(_, at)| at),
        }
    }

    pub fn get_summary_output(&self) -> String {
        self.formatter.format_summary(&self.summary())
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureResult, ScenarioDescriptor};
    use std::path::PathBuf;

    const SAMPLE_OUTPUT: &str = r#"[{
        "uri": "features/sample.feature",
        "name": "Sample",
        "elements": [{"keyword": "Scenario", "name": "Sample scenario", "line": 7, "type": "scenario", "steps": [
            {"keyword": "Given ", "name": "I am a test", "result": {"status": "undefined"}},
            {"keyword": "Then ", "name": "I am a step", "result": {"status": "undefined"}}
        ]}]
    }]"#;

    fn sample_feature() -> FeatureResult {
        let mut entries: Vec<FeatureResult> = serde_json::from_str(SAMPLE_OUTPUT).unwrap();
        entries.pop().unwrap()
    }

    fn record(exit_code: i32, ms: u64, results: Option<FeatureResult>) -> ResultRecord {
        ResultRecord {
            scenario: ScenarioDescriptor::new("features/sample.feature", 7),
            exit_code,
            duration: Duration::from_millis(ms),
            error: None,
            stderr: None,
            results,
            log_path: PathBuf::from("logs/sample.feature-line-7.json"),
        }
    }

    #[test]
    fn test_valid_run_updates_counters() {
        let mut aggregator = ResultAggregator::new();
        let output = aggregator.handle_result(&record(0, 100, Some(sample_feature())));

        let counters = aggregator.counters();
        assert_eq!(counters.total_steps, 2);
        assert_eq!(counters.total_scenarios, 1);
        assert_eq!(counters.total_duration, Duration::from_millis(100));
        assert_eq!(counters.step_statuses.get(&StepStatus::Undefined), Some(&2));
        assert_eq!(counters.step_statuses.len(), 1);
        assert_eq!(
            counters.scenario_statuses,
            ScenarioTally {
                passed: 1,
                failed: 0
            }
        );
        assert!(counters.failed_scenarios.is_empty());
        assert_eq!(
            counters.undefined_steps,
            vec!["Given I am a test".to_string(), "Then I am a step".to_string()]
        );
        assert!(!output.is_empty());
    }

    #[test]
    fn test_errored_run_counts_failed_scenario_without_steps() {
        let mut aggregator = ResultAggregator::new();
        let mut errored = record(10, 100, Some(sample_feature()));
        errored.error = Some("Test error".to_string());
        let output = aggregator.handle_result(&errored);

        let counters = aggregator.counters();
        assert_eq!(counters.total_steps, 0);
        assert_eq!(counters.total_scenarios, 1);
        assert_eq!(counters.total_duration, Duration::from_millis(100));
        assert!(counters.step_statuses.is_empty());
        assert_eq!(counters.scenario_statuses.failed, 1);
        assert_eq!(counters.scenario_statuses.passed, 0);
        assert!(counters.undefined_steps.is_empty());
        assert_eq!(counters.failed_scenarios, vec!["features/sample.feature:7"]);
        assert!(output.contains("Test error"));
    }

    #[test]
    fn test_counters_accumulate() {
        let mut aggregator = ResultAggregator::new();
        aggregator.handle_result(&record(0, 100, Some(sample_feature())));
        aggregator.handle_result(&record(0, 200, Some(sample_feature())));

        let counters = aggregator.counters();
        assert_eq!(counters.total_steps, 4);
        assert_eq!(counters.total_scenarios, 2);
        assert_eq!(counters.total_duration, Duration::from_millis(300));
        assert_eq!(counters.step_statuses.get(&StepStatus::Undefined), Some(&4));
        assert_eq!(counters.scenario_statuses.passed, 2);
        assert!(counters.failed_scenarios.is_empty());
        assert_eq!(counters.undefined_steps.len(), 2);
    }

    #[test]
    fn test_failed_step_or_exit_code_fails_scenario() {
        let mut feature = sample_feature();
        feature.elements[0].steps[1].result.status = StepStatus::Failed;

        let mut aggregator = ResultAggregator::new().no_color();
        let line = aggregator.handle_result(&record(0, 10, Some(feature)));
        assert!(line.contains("failed at \"Then I am a step\""));

        aggregator.handle_result(&record(1, 10, Some(sample_feature())));
        assert_eq!(aggregator.counters().scenario_statuses.failed, 2);
    }

    #[test]
    fn test_summary_output() {
        let mut aggregator = ResultAggregator::new();
        aggregator.handle_result(&record(0, 100, Some(sample_feature())));
        aggregator.set_end_time();

        let summary = aggregator.get_summary_output();
        assert!(summary.contains("1 scenario (\u{1b}[32m1 passed\u{1b}[0m)"));
        assert!(summary.contains("2 steps (\u{1b}[33m2 undefined\u{1b}[0m)"));
        assert!(summary.contains("Total duration: "));
        assert!(summary
            .contains("(100ms if ran in series - N/A speed increase via parallelization)"));
    }

    #[test]
    fn test_summary_speedup_with_parallel_workers() {
        let mut aggregator = ResultAggregator::new().no_color();
        aggregator.handle_result(&record(0, 60_000, Some(sample_feature())));
        aggregator.set_parallelism(4);
        std::thread::sleep(Duration::from_millis(2));
        aggregator.set_end_time();

        let summary = aggregator.summary();
        assert_eq!(summary.parallelism, 4);
        assert!(summary.speedup.unwrap() > 1.0);
        assert!(summary.finished_at.is_some());
        assert!(aggregator.get_summary_output().contains("x speed increase"));
    }

    #[test]
    fn test_empty_summary() {
        let aggregator = ResultAggregator::new().no_color();
        let output = aggregator.get_summary_output();
        assert!(output.starts_with("0 scenarios\n0 steps\n"));

        let json = serde_json::to_value(aggregator.summary()).unwrap();
        assert_eq!(json["scenarios"], 0);
        assert!(json["serial_duration_ms"].is_u64());
    }
}
