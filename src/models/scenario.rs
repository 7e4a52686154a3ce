//! Scenario identity
//!
//! A scenario is addressed by its feature file and the line it starts on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Immutable identity of one executable scenario
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// Feature file containing the scenario
    pub feature_file: PathBuf,

    /// Line of the scenario (or of the examples row for outlines)
    pub line: u32,

    /// Whether this is one row of a scenario outline
    pub outline: bool,

    /// Scenario name as written in the feature file
    #[serde(default)]
    pub name: String,

    /// Effective tags, feature tags included
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScenarioDescriptor {
    pub fn new(feature_file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            feature_file: feature_file.into(),
            line,
            outline: false,
            name: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn outline(mut self) -> Self {
        self.outline = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Executor target, `<file>:<line>`
    pub fn target(&self) -> String {
        format!("{}:{}", self.feature_file.display(), self.line)
    }

    /// Base name of the feature file, used for result-log naming
    pub fn file_name(&self) -> String {
        self.feature_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.feature_file.display().to_string())
    }

    /// Result-log file for this scenario inside `log_dir`
    ///
    /// Two scenarios in same-named files from different directories map to the
    /// same path when they share a line number.
    pub fn log_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{}-line-{}.json", self.file_name(), self.line))
    }
}

impl fmt::Display for ScenarioDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_and_display() {
        let scenario = ScenarioDescriptor::new("features/login.feature", 12);
        assert_eq!(scenario.target(), "features/login.feature:12");
        assert_eq!(scenario.to_string(), "features/login.feature:12");
    }

    #[test]
    fn test_log_path_uses_base_name() {
        let scenario = ScenarioDescriptor::new("a/b/checkout.feature", 7).outline();
        let path = scenario.log_path(Path::new("logs"));
        assert_eq!(path, PathBuf::from("logs/checkout.feature-line-7.json"));
        assert!(scenario.outline);
    }

    #[test]
    fn test_log_path_collides_across_directories() {
        let first = ScenarioDescriptor::new("one/shared.feature", 3);
        let second = ScenarioDescriptor::new("two/shared.feature", 3);
        let dir = Path::new("logs");
        assert_eq!(first.log_path(dir), second.log_path(dir));
    }
}
