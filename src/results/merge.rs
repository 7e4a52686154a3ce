//! Result log consolidation
//!
//! After a run, every per-scenario result log is concatenated into one
//! merged document at `<log_dir>/merged/results.json`.

use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::RunError;

/// Subdirectory of the log directory holding the merged document
pub const MERGED_DIR: &str = "merged";

/// File name of the merged document
pub const MERGED_FILE: &str = "results.json";

/// What a merge produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    pub path: PathBuf,

    /// Per-scenario logs that were merged
    pub files: usize,

    /// Result entries written
    pub entries: usize,

    /// Logs that were not a JSON array and were left out
    pub skipped: usize,
}

/// Concatenates per-scenario result logs
pub struct LogMerger {
    log_dir: PathBuf,
}

impl LogMerger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Destination of the merged document
    pub fn merged_path(&self) -> PathBuf {
        self.log_dir.join(MERGED_DIR).join(MERGED_FILE)
    }

    /// Merge every `*.json` file of the log directory, in directory listing order
    pub fn merge(&self) -> Result<MergeReport, RunError> {
        let merged_path = self.merged_path();
        let io_err = |source| RunError::Merge {
            path: merged_path.clone(),
            source,
        };

        let mut entries: Vec<Value> = Vec::new();
        let mut files = 0;
        let mut skipped = 0;

        for dir_entry in fs::read_dir(&self.log_dir).map_err(io_err)? {
            let path = dir_entry.map_err(io_err)?.path();
            if !is_result_log(&path) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(io_err)?;
            match serde_json::from_str::<Vec<Value>>(&content) {
                Ok(mut results) => {
                    debug!("Merging {} ({} entries)", path.display(), results.len());
                    entries.append(&mut results);
                    files += 1;
                }
                Err(e) => {
                    warn!("Skipping unreadable result log {}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        let merged_dir = self.log_dir.join(MERGED_DIR);
        fs::create_dir_all(&merged_dir).map_err(io_err)?;
        write_pretty(&merged_path, &entries).map_err(io_err)?;

        info!(
            "Merged {} result entries from {} logs into {}",
            entries.len(),
            files,
            merged_path.display()
        );

        Ok(MergeReport {
            path: merged_path,
            files,
            entries: entries.len(),
            skipped,
        })
    }
}

fn is_result_log(path: &Path) -> bool {
    path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false)
}

/// Pretty JSON with four-space indentation
fn write_pretty<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.flush()
}
