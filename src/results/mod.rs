//! Results consolidation module
//!
//! Merges per-scenario result logs once a run has converged.

mod merge;

pub use merge::{LogMerger, MergeReport};
