//! Scenario execution engine
//!
//! One subprocess per scenario, a bounded pool of them running at once.

mod dispatcher;
mod runner;
mod worker;

#[cfg(all(test, unix))]
pub(crate) mod test_support;

pub use runner::ScenarioRunner;
pub use worker::{IoMode, WorkerOptions};
