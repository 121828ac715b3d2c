//! Scheduling module for sluice.
//!
//! Provides the interval-driven smoke-test prediction job and the delimited
//! sample loader that feeds it.

mod job;
mod loader;

pub use job::{JobResult, JobStats, ScheduledPrediction};
pub use loader::{DelimitedSampleLoader, PredictionResult, SAMPLE_ID_FIELD};
