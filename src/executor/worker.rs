//! Single-scenario subprocess worker
//!
//! A worker runs one scenario through the external executor and always
//! resolves to a `ResultRecord`, whatever happens to the subprocess.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{FeatureResult, ResultRecord, ScenarioDescriptor};
use crate::utils::Timer;

/// How long stderr may stay open after the executor exited
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// How the executor's standard streams are wired
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IoMode {
    /// Inherit the terminal, for interactive debugging
    Inherit,
    /// Discard stdin/stdout and buffer stderr for diagnostics
    #[default]
    Captured,
}

/// Options shared by every worker of a run
#[derive(Clone, Debug)]
pub struct WorkerOptions {
    pub executor: PathBuf,
    pub executor_args: Vec<String>,
    pub log_dir: PathBuf,
    pub requires: Vec<String>,
    pub io_mode: IoMode,
}

/// Runs one scenario in an isolated executor subprocess
#[derive(Debug)]
pub struct WorkerProcess {
    scenario: ScenarioDescriptor,
    log_path: PathBuf,
    program: PathBuf,
    args: Vec<String>,
    io_mode: IoMode,
    kill_tx: watch::Sender<bool>,
}

impl WorkerProcess {
    pub fn new(scenario: ScenarioDescriptor, options: &WorkerOptions) -> Self {
        let log_path = scenario.log_path(&options.log_dir);

        let mut args = options.executor_args.clone();
        args.push(scenario.target());
        args.push("-f".to_string());
        args.push(format!("json:{}", log_path.display()));

        for module in &options.requires {
            args.push("-r".to_string());
            args.push(module.clone());
        }

        let (kill_tx, _) = watch::channel(false);

        Self {
            scenario,
            log_path,
            program: options.executor.clone(),
            args,
            io_mode: options.io_mode,
            kill_tx,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Arguments passed to the executor
    #[cfg(test)]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Terminate the subprocess. No effect once it has exited.
    pub fn kill(&self) {
        self.kill_tx.send_replace(true);
    }

    pub fn is_killed(&self) -> bool {
        *self.kill_tx.borrow()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);

        match self.io_mode {
            IoMode::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            IoMode::Captured => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped());
            }
        }

        command
    }

    /// Run the scenario to completion
    pub async fn execute(&self) -> ResultRecord {
        let timer = Timer::start(self.scenario.target());
        let mut kill_rx = self.kill_tx.subscribe();

        if let Err(e) = tokio::fs::remove_file(&self.log_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Could not remove stale result log {}: {}",
                    self.log_path.display(),
                    e
                );
            }
        }

        if self.is_killed() {
            return self
                .finish(1, Some("Worker killed before launch".to_string()), None, timer)
                .await;
        }

        debug!(
            "Launching {} {}",
            self.program.display(),
            self.args.join(" ")
        );

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch executor for {}: {}", self.scenario, e);
                let error = format!(
                    "Failed to launch executor {}: {}",
                    self.program.display(),
                    e
                );
                return self.finish(1, Some(error), None, timer).await;
            }
        };

        let stderr_capture = child.stderr.take().map(StderrCapture::start);

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = wait_for_kill(&mut kill_rx) => None,
        };

        let (exit_code, error, grace) = match status {
            Some(Ok(status)) => (exit_code(status), None, STDERR_GRACE),
            Some(Err(e)) => (
                1,
                Some(format!("Failed to wait for executor: {e}")),
                STDERR_GRACE,
            ),
            None => {
                terminate(&mut child, &self.scenario).await;
                (1, Some("Worker killed".to_string()), Duration::ZERO)
            }
        };

        // grandchildren may keep the pipe open long after the executor exited
        let stderr = match stderr_capture {
            Some(capture) => capture.collect(grace).await,
            None => None,
        };

        self.finish(exit_code, error, stderr, timer).await
    }

    /// Read the result log and build the normalized record
    async fn finish(
        &self,
        exit_code: i32,
        error: Option<String>,
        stderr: Option<String>,
        timer: Timer,
    ) -> ResultRecord {
        let (exit_code, error, results) = match read_last_entry(&self.log_path).await {
            Ok(entry) => (exit_code, error, Some(entry)),
            Err(reason) => {
                debug!("{}: {}", self.scenario, reason);
                let unreadable = format!("Executor failed to produce parseable results: {reason}");
                let error = match error {
                    Some(existing) => format!("{existing}\n{unreadable}"),
                    None => unreadable,
                };
                (1, Some(error), None)
            }
        };

        ResultRecord {
            scenario: self.scenario.clone(),
            exit_code,
            duration: timer.stop(),
            error,
            stderr,
            results,
            log_path: self.log_path.clone(),
        }
    }
}

/// Buffers the executor's stderr while it runs
struct StderrCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StderrCapture {
    fn start(mut stderr: ChildStderr) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();

        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });

        Self { buf, task }
    }

    /// Wait up to `grace` for end of file, then keep whatever arrived
    async fn collect(mut self, grace: Duration) -> Option<String> {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            debug!("stderr still open after exit, not waiting for it");
            self.task.abort();
        }

        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Exit code of a finished process, `1` when killed by a signal
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

async fn wait_for_kill(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Kill and reap the subprocess
async fn terminate(child: &mut Child, scenario: &ScenarioDescriptor) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill executor for {}: {}", scenario, e);
    }
}

async fn read_last_entry(path: &Path) -> Result<FeatureResult, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut entries: Vec<FeatureResult> = serde_json::from_str(&content)
        .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
    entries
        .pop()
        .ok_or_else(|| format!("{} contains no result entries", path.display()))
}
