//! Scenario result models
//!
//! Defines the executor's JSON result entries and the normalized record
//! produced for every scenario run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::ScenarioDescriptor;

/// Step execution status as reported by the executor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Failed,
    Ambiguous,
    Undefined,
    Pending,
    Skipped,
    Passed,
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    /// Reporting order used in summaries
    pub fn all() -> [StepStatus; 7] {
        [
            StepStatus::Failed,
            StepStatus::Ambiguous,
            StepStatus::Undefined,
            StepStatus::Pending,
            StepStatus::Skipped,
            StepStatus::Passed,
            StepStatus::Unknown,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepStatus::Failed => "failed",
            StepStatus::Ambiguous => "ambiguous",
            StepStatus::Undefined => "undefined",
            StepStatus::Pending => "pending",
            StepStatus::Skipped => "skipped",
            StepStatus::Passed => "passed",
            StepStatus::Unknown => "unknown",
        }
    }

    /// Whether a step in this status fails its scenario
    pub fn fails_scenario(&self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Ambiguous)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: StepStatus,

    /// Duration in nanoseconds
    #[serde(default)]
    pub duration: Option<u64>,

    #[serde(default)]
    pub error_message: Option<String>,
}

/// One step of a scenario or background
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default)]
    pub keyword: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub line: Option<u32>,

    /// Hooks are reported as hidden steps
    #[serde(default)]
    pub hidden: bool,

    pub result: StepOutcome,
}

impl StepResult {
    /// Step text as written, e.g. `Given I am logged in`
    pub fn text(&self) -> String {
        format!("{}{}", self.keyword, self.name).trim().to_string()
    }
}

/// A scenario or background inside a feature result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementResult {
    #[serde(default)]
    pub keyword: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub line: Option<u32>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl ElementResult {
    pub fn is_background(&self) -> bool {
        self.kind.as_deref() == Some("background")
    }
}

/// One entry of the executor's JSON result array
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureResult {
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub elements: Vec<ElementResult>,
}

impl FeatureResult {
    /// Visible steps across all elements, hooks excluded
    pub fn steps(&self) -> impl Iterator<Item = &StepResult> {
        self.elements
            .iter()
            .flat_map(|e| e.steps.iter())
            .filter(|s| !s.hidden)
    }

    /// Name of the first non-background element
    pub fn scenario_name(&self) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| !e.is_background())
            .map(|e| e.name.as_str())
    }
}

/// Normalized outcome of running one scenario
#[derive(Clone, Debug)]
pub struct ResultRecord {
    pub scenario: ScenarioDescriptor,
    pub exit_code: i32,
    pub duration: Duration,

    /// Launch failure or unreadable output
    pub error: Option<String>,

    /// Standard error captured from the executor
    pub stderr: Option<String>,

    /// Last entry of the result log, if it could be read
    pub results: Option<FeatureResult>,

    pub log_path: PathBuf,
}

impl ResultRecord {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[{
        "uri": "features/sample.feature",
        "name": "Sample",
        "elements": [
            {"keyword": "Background", "name": "", "type": "background", "steps": [
                {"keyword": "Given ", "name": "a clean slate", "result": {"status": "passed", "duration": 10}}
            ]},
            {"keyword": "Scenario", "name": "Adding", "line": 7, "type": "scenario", "steps": [
                {"keyword": "Before", "hidden": true, "result": {"status": "passed"}},
                {"keyword": "When ", "name": "I add", "result": {"status": "failed", "error_message": "boom"}},
                {"keyword": "Then ", "name": "it adds", "result": {"status": "flaky"}}
            ]}
        ]
    }]"#;

    #[test]
    fn test_parse_feature_result() {
        let entries: Vec<FeatureResult> = serde_json::from_str(SAMPLE).unwrap();
        let feature = entries.last().unwrap();

        assert_eq!(feature.uri, "features/sample.feature");
        assert_eq!(feature.scenario_name(), Some("Adding"));

        let steps: Vec<_> = feature.steps().collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].result.status, StepStatus::Failed);
        assert_eq!(steps[2].result.status, StepStatus::Unknown);
        assert_eq!(steps[1].text(), "When I add");
    }

    #[test]
    fn test_status_fails_scenario() {
        assert!(StepStatus::Failed.fails_scenario());
        assert!(StepStatus::Ambiguous.fails_scenario());
        assert!(!StepStatus::Undefined.fails_scenario());
        assert!(!StepStatus::Skipped.fails_scenario());
    }
}
