//! Data models for scenario runs
//!
//! This module contains the data structures shared by discovery, workers and reporting.

mod result;
mod scenario;

pub use result::{FeatureResult, ResultRecord, StepStatus};
pub use scenario::ScenarioDescriptor;
