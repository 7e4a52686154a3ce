//! Output module
//!
//! Result aggregation and the text shown to the user while and after a run.

mod aggregator;
mod formatter;

pub use aggregator::{ResultAggregator, RunSummary};
pub use formatter::pluralize;
