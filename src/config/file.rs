//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RunnerConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./parallel-scenarios.yaml",
    "./parallel-scenarios.yml",
    "./.parallel-scenarios.yaml",
    "~/.config/parallel-scenarios/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Runner settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

const CONFIG_VERSION: &str = "1.0";

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Serialization format of a configuration file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }

    /// Format named on the command line
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            other => anyhow::bail!("Unknown config format '{}', expected yaml or json", other),
        }
    }

    fn parse(self, content: &str) -> Result<ConfigFile> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content).context("Invalid YAML"),
            ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON"),
        }
    }

    pub fn render(self, config: &ConfigFile) -> Result<String> {
        match self {
            ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to render YAML"),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).context("Failed to render JSON")
            }
        }
    }
}

impl ConfigFile {
    /// First standard location holding a file
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .filter_map(|location| expand_home(location))
            .find(|path| path.is_file())
    }

    /// Load the first file found in the standard locations, or the defaults
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => {
                debug!("Using configuration file {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = ConfigFormat::from_path(path)
            .parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the file in the format its extension names, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = ConfigFormat::from_path(path).render(self)?;

        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            _ => {}
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if self.runner.workers == 0 {
            anyhow::bail!("Invalid worker count 0. At least one worker is required");
        }

        if self.runner.executor.as_os_str().is_empty() {
            anyhow::bail!("No executor configured");
        }

        Ok(())
    }

    /// Starting point written by `config init`
    pub fn example() -> Self {
        Self {
            version: default_version(),
            runner: RunnerConfig {
                workers: 4,
                requires: vec!["features/step_definitions".to_string()],
                tags: vec!["~@wip".to_string()],
                ..RunnerConfig::default()
            },
        }
    }
}

/// Resolve a leading `~` against the home directory. `None` when there is no home.
fn expand_home(location: &str) -> Option<PathBuf> {
    match location.strip_prefix('~') {
        Some("") => dirs::home_dir(),
        Some(rest) => match rest.strip_prefix('/') {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(location)),
        },
        None => Some(PathBuf::from(location)),
    }
}
