//! Fake executors for exercising real subprocess paths in tests

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script into `dir`
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

// The executor sees `<file>:<line> -f json:<path> ...`, so $3 is `json:<path>`.

/// Writes one passing scenario with a single step, exits 0
pub const WRITE_PASSING: &str = r#"out="${3#json:}"
cat > "$out" <<'JSON'
[{"uri": "a.feature", "name": "A", "elements": [{"name": "S", "type": "scenario", "steps": [
  {"keyword": "Given ", "name": "x", "result": {"status": "passed"}}
]}]}]
JSON
exit 0"#;

/// Writes one failing scenario with two steps, exits 1
pub const WRITE_FAILING: &str = r#"out="${3#json:}"
cat > "$out" <<'JSON'
[{"uri": "b.feature", "name": "B", "elements": [{"name": "F", "type": "scenario", "steps": [
  {"keyword": "Given ", "name": "x", "result": {"status": "passed"}},
  {"keyword": "Then ", "name": "y", "result": {"status": "failed", "error_message": "nope"}}
]}]}]
JSON
exit 1"#;
