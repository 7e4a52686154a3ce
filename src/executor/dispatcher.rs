//! Bounded worker pool
//!
//! The dispatcher owns the pending queue, the active workers and the run's
//! counters. Workers report back over a completion channel that only the
//! dispatcher loop consumes.

use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::error::RunError;
use crate::models::{ResultRecord, ScenarioDescriptor};
use crate::output::{ResultAggregator, RunSummary};
use crate::results::{LogMerger, MergeReport};

use super::worker::{WorkerOptions, WorkerProcess};

type WorkerId = usize;

/// A dispatched scenario and its live worker
struct WorkerHandle {
    scenario: ScenarioDescriptor,
    worker: Arc<WorkerProcess>,
    task: JoinHandle<()>,
}

/// Cancels a run from another task
#[derive(Clone, Debug)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl KillSwitch {
    pub fn kill(&self) {
        self.tx.send_replace(true);
    }
}

/// How a run converged
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub summary: RunSummary,

    /// The run was killed before every scenario finished
    pub cancelled: bool,

    /// Scenarios still queued when the run was killed
    pub unstarted: usize,

    /// Consolidated log, or why it could not be written
    pub merge: Result<MergeReport, RunError>,
}

/// Runs scenarios through at most `workers` concurrent subprocesses
pub struct ScenarioDispatcher {
    config: DispatchConfig,
    options: WorkerOptions,
    aggregator: ResultAggregator,
    pending: VecDeque<ScenarioDescriptor>,
    active: HashMap<WorkerId, WorkerHandle>,
    next_id: WorkerId,
    exit_code: i32,
    done_tx: mpsc::UnboundedSender<(WorkerId, ResultRecord)>,
    done_rx: mpsc::UnboundedReceiver<(WorkerId, ResultRecord)>,
    kill_tx: Arc<watch::Sender<bool>>,
    kill_rx: watch::Receiver<bool>,
    killed: bool,
    peak_active: usize,
    merge: Option<Result<MergeReport, RunError>>,
}

impl ScenarioDispatcher {
    pub fn new(config: DispatchConfig, options: WorkerOptions) -> Self {
        let mut aggregator = ResultAggregator::new();
        if !config.color {
            aggregator = aggregator.no_color();
        }

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);

        Self {
            config,
            options,
            aggregator,
            pending: VecDeque::new(),
            active: HashMap::new(),
            next_id: 0,
            exit_code: 0,
            done_tx,
            done_rx,
            kill_tx: Arc::new(kill_tx),
            kill_rx,
            killed: false,
            peak_active: 0,
            merge: None,
        }
    }

    /// Queue the scenarios and launch the first batch
    pub fn start(&mut self, scenarios: Vec<ScenarioDescriptor>) {
        info!(
            "Dispatching {} scenarios on {} workers",
            scenarios.len(),
            self.config.workers
        );
        self.pending.extend(scenarios);
        self.fill();
        self.finalize_if_converged();
    }

    /// Launch one scenario in its own worker task
    pub fn dispatch_next(&mut self, scenario: ScenarioDescriptor) {
        let id = self.next_id;
        self.next_id += 1;

        let worker = Arc::new(WorkerProcess::new(scenario.clone(), &self.options));
        debug!("Dispatching {} -> {}", scenario, worker.log_path().display());

        let running = worker.clone();
        let done_tx = self.done_tx.clone();
        let task = tokio::spawn(async move {
            let record = running.execute().await;
            let _ = done_tx.send((id, record));
        });

        self.active.insert(
            id,
            WorkerHandle {
                scenario,
                worker,
                task,
            },
        );
        self.peak_active = self.peak_active.max(self.active.len());
    }

    /// Consume one worker's result and refill the pool
    pub fn on_worker_done(&mut self, id: WorkerId, result: ResultRecord) {
        let Some(handle) = self.active.remove(&id) else {
            warn!("Result for unknown worker {}: {}", id, result.scenario);
            return;
        };

        if self.killed {
            debug!("Discarding result of killed worker {}", handle.scenario);
            self.finalize_if_converged();
            return;
        }

        debug!(
            "{} finished in {}ms, log {}",
            handle.scenario,
            result.duration_ms(),
            result.log_path.display()
        );
        if let Some(stderr) = &result.stderr {
            debug!("{} stderr:\n{}", handle.scenario, stderr.trim_end());
        }

        println!("{}", self.aggregator.handle_result(&result));
        if result.exit_code != 0 {
            self.exit_code = 1;
        }

        self.fill();
        self.finalize_if_converged();
    }

    /// Stop every active worker. Queued scenarios are never started.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        warn!(
            "Killing {} active workers, {} scenarios left unstarted",
            self.active.len(),
            self.pending.len()
        );

        self.killed = true;
        self.kill_tx.send_replace(true);
        for handle in self.active.values() {
            handle.worker.kill();
        }
    }

    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            tx: self.kill_tx.clone(),
        }
    }

    /// Highest number of workers that ran at once
    pub fn peak_active(&self) -> usize {
        self.peak_active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drive the run until the queue and the active set are both empty
    pub async fn await_completion(mut self) -> RunOutcome {
        loop {
            if self.killed && !self.active.is_empty() {
                self.reap().await;
                self.finalize_if_converged();
            }
            if self.is_converged() {
                break;
            }

            tokio::select! {
                Some((id, record)) = self.done_rx.recv() => {
                    self.on_worker_done(id, record);
                }
                Ok(()) = self.kill_rx.changed(), if !self.killed => {
                    if *self.kill_rx.borrow_and_update() {
                        self.kill();
                    }
                }
                else => break,
            }
        }

        let merge = match self.merge.take() {
            Some(merge) => merge,
            None => self.finalize(),
        };

        let exit_code = if self.killed || merge.is_err() {
            1
        } else {
            self.exit_code
        };

        RunOutcome {
            exit_code,
            summary: self.aggregator.summary(),
            cancelled: self.killed,
            unstarted: if self.killed { self.pending.len() } else { 0 },
            merge,
        }
    }

    fn is_converged(&self) -> bool {
        self.active.is_empty() && (self.pending.is_empty() || self.killed)
    }

    fn fill(&mut self) {
        while !self.killed && self.active.len() < self.config.workers {
            match self.pending.pop_front() {
                Some(scenario) => self.dispatch_next(scenario),
                None => break,
            }
        }
    }

    /// Wait for killed workers to exit and drop whatever they reported
    async fn reap(&mut self) {
        let handles: Vec<WorkerHandle> = self.active.drain().map(|(_, h)| h).collect();
        let abandoned = handles.len();

        for result in join_all(handles.into_iter().map(|h| h.task)).await {
            if let Err(e) = result {
                warn!("Worker task failed: {}", e);
            }
        }
        while self.done_rx.try_recv().is_ok() {}

        info!("Abandoned {} in-flight scenarios", abandoned);
    }

    fn finalize_if_converged(&mut self) {
        if self.merge.is_none() && self.is_converged() {
            let merge = self.finalize();
            self.merge = Some(merge);
        }
    }

    /// Emit the summary, then consolidate the logs
    fn finalize(&mut self) -> Result<MergeReport, RunError> {
        self.aggregator.set_parallelism(self.peak_active());
        self.aggregator.set_end_time();

        if !self.config.silent_summary {
            println!("\n{}", self.aggregator.get_summary_output());
        }

        LogMerger::new(&self.options.log_dir)
            .merge()
            .inspect_err(|e| error!("{}", e))
    }
}
