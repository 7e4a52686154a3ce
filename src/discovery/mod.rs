//! Scenario discovery
//!
//! Finds the scenarios to run, in a stable order, from feature files on disk.

mod parser;

pub use parser::parse_feature;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::models::ScenarioDescriptor;

/// Source of the ordered scenario list for a run
pub trait ScenarioSource {
    fn discover(&self) -> impl Future<Output = Result<Vec<ScenarioDescriptor>>> + Send;
}

/// A fixed list, mostly useful for tests and re-runs
impl ScenarioSource for Vec<ScenarioDescriptor> {
    async fn discover(&self) -> Result<Vec<ScenarioDescriptor>> {
        Ok(self.clone())
    }
}

/// Scenario filter options
#[derive(Clone, Debug, Default)]
pub struct DiscoveryOptions {
    /// `@tag` keeps scenarios carrying any listed tag, `~@tag` drops them
    pub tags: Vec<String>,

    /// Keep scenarios whose name contains this text
    pub name: Option<String>,
}

impl DiscoveryOptions {
    fn matches(&self, scenario: &ScenarioDescriptor) -> bool {
        let (excluded, included): (Vec<&str>, Vec<&str>) = self
            .tags
            .iter()
            .map(String::as_str)
            .partition(|t| t.starts_with('~'));

        let has = |tag: &str| scenario.tags.iter().any(|t| t == tag);

        if excluded.iter().any(|t| has(&t[1..])) {
            return false;
        }
        if !included.is_empty() && !included.iter().any(|t| has(t)) {
            return false;
        }

        match &self.name {
            Some(name) => scenario.name.contains(name.as_str()),
            None => true,
        }
    }
}

/// Discovers scenarios in `.feature` files
#[derive(Clone, Debug)]
pub struct FeatureFinder {
    paths: Vec<PathBuf>,
    options: DiscoveryOptions,
}

impl FeatureFinder {
    pub fn new(paths: Vec<PathBuf>, options: DiscoveryOptions) -> Self {
        Self { paths, options }
    }

    /// Scan all paths synchronously
    pub fn find(&self) -> Result<Vec<ScenarioDescriptor>> {
        let mut scenarios = Vec::new();

        for path in &self.paths {
            let (path, line) = split_line_suffix(path);

            let files = if path.is_dir() {
                collect_feature_files(&path)?
            } else {
                vec![path.clone()]
            };

            for file in files {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read feature file: {}", file.display()))?;
                let found = parse_feature(&file, &content);
                debug!("{}: {} scenarios", file.display(), found.len());

                scenarios.extend(
                    found
                        .into_iter()
                        .filter(|s| line.map(|l| s.line == l).unwrap_or(true))
                        .filter(|s| self.options.matches(s)),
                );
            }
        }

        Ok(scenarios)
    }
}

impl ScenarioSource for FeatureFinder {
    async fn discover(&self) -> Result<Vec<ScenarioDescriptor>> {
        let finder = self.clone();
        tokio::task::spawn_blocking(move || finder.find())
            .await
            .context("Scenario discovery task failed")?
    }
}

/// `features/a.feature:12` → (`features/a.feature`, Some(12))
fn split_line_suffix(path: &Path) -> (PathBuf, Option<u32>) {
    let raw = path.to_string_lossy();
    if let Some((file, line)) = raw.rsplit_once(':') {
        if let Ok(line) = line.parse() {
            if file.ends_with(".feature") {
                return (PathBuf::from(file), Some(line));
            }
        }
    }
    (path.to_path_buf(), None)
}

/// Every `.feature` file under `dir`, sorted by name within each directory.
/// Symlinked directories are not followed.
fn collect_feature_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if entry.file_type().is_file() && is_feature_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn is_feature_file(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "feature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LOGIN: &str = "\
@auth
Feature: Login

  Scenario: Good password
    Given a user

  @wip
  Scenario: Bad password
    Given a user
";

    const CART: &str = "\
Feature: Cart

  Scenario: Empty cart
    Given nothing
";

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("login.feature"), LOGIN).unwrap();
        std::fs::write(dir.path().join("nested").join("cart.feature"), CART).unwrap();
        std::fs::write(dir.path().join("readme.md"), "# not a feature").unwrap();
        dir
    }

    #[test]
    fn test_find_recurses_in_sorted_order() {
        let dir = fixture();
        let finder = FeatureFinder::new(vec![dir.path().to_path_buf()], Default::default());
        let scenarios = finder.find().unwrap();

        let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Good password", "Bad password", "Empty cart"]);
    }

    #[test]
    fn test_tag_filters() {
        let dir = fixture();
        let options = DiscoveryOptions {
            tags: vec!["@auth".to_string(), "~@wip".to_string()],
            name: None,
        };
        let scenarios = FeatureFinder::new(vec![dir.path().to_path_buf()], options)
            .find()
            .unwrap();

        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "Good password");
        assert_eq!(scenarios[0].line, 4);
    }

    #[test]
    fn test_name_filter_and_line_suffix() {
        let dir = fixture();
        let options = DiscoveryOptions {
            tags: Vec::new(),
            name: Some("Checkout".to_string()),
        };
        assert!(FeatureFinder::new(vec![dir.path().to_path_buf()], options)
            .find()
            .unwrap()
            .is_empty());

        let target = PathBuf::from(format!("{}:8", dir.path().join("login.feature").display()));
        let scenarios = FeatureFinder::new(vec![target], Default::default())
            .find()
            .unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "Bad password");
    }

    #[tokio::test]
    async fn test_discover_async() {
        let dir = fixture();
        let finder = FeatureFinder::new(vec![dir.path().join("nested")], Default::default());
        let scenarios = finder.discover().await.unwrap();
        assert_eq!(scenarios.len(), 1);

        let fixed = vec![ScenarioDescriptor::new("x.feature", 2)];
        assert_eq!(fixed.discover().await.unwrap(), fixed);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("nested"), dir.path().join("again")).unwrap();

        let scenarios = FeatureFinder::new(vec![dir.path().to_path_buf()], Default::default())
            .find()
            .unwrap();

        let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Good password", "Bad password", "Empty cart"]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let finder = FeatureFinder::new(vec![PathBuf::from("/no/such.feature")], Default::default());
        assert!(finder.find().is_err());
    }
}
