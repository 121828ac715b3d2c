//! Periodic smoke-test prediction job.
//!
//! Each run loads a small sample batch and scores it through the same
//! [`BatchCoordinator`] that serves requests. Runs never overlap: a tick
//! that finds the previous run still in flight is recorded as skipped.

use super::loader::{DelimitedSampleLoader, PredictionResult};
use crate::compute::BatchCoordinator;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobResult {
    /// Batch scored.
    Success { records: usize, duration_ms: u64 },
    /// Loading or scoring failed.
    Failed { error: String, duration_ms: u64 },
    /// Previous run still in progress.
    Skipped { reason: String },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobResult::Skipped { .. })
    }
}

/// Statistics for the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    /// Total number of runs.
    pub total_runs: u64,
    /// Number of successful runs.
    pub successful_runs: u64,
    /// Number of failed runs.
    pub failed_runs: u64,
    /// Number of skipped runs.
    pub skipped_runs: u64,
    /// Last run time.
    pub last_run: Option<DateTime<Utc>>,
    /// Last successful run time.
    pub last_success: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Average successful run duration in milliseconds.
    pub avg_duration_ms: f64,
    total_duration_ms: u64,
}

impl JobStats {
    /// Record a job result.
    pub fn record(&mut self, result: &JobResult) {
        self.total_runs += 1;
        self.last_run = Some(Utc::now());

        match result {
            JobResult::Success { duration_ms, .. } => {
                self.successful_runs += 1;
                self.last_success = Some(Utc::now());
                self.total_duration_ms += duration_ms;
                self.avg_duration_ms =
                    self.total_duration_ms as f64 / self.successful_runs as f64;
            }
            JobResult::Failed { error, .. } => {
                self.failed_runs += 1;
                self.last_error = Some(error.clone());
            }
            JobResult::Skipped { .. } => {
                self.skipped_runs += 1;
            }
        }
    }

    /// Calculate success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            return 0.0;
        }
        self.successful_runs as f64 / self.total_runs as f64
    }
}

/// Scores a sample batch on demand or on an interval.
pub struct ScheduledPrediction {
    coordinator: Arc<BatchCoordinator>,
    loader: DelimitedSampleLoader,
    running: tokio::sync::Mutex<()>,
    stats: Mutex<JobStats>,
}

impl ScheduledPrediction {
    pub fn new(coordinator: Arc<BatchCoordinator>, loader: DelimitedSampleLoader) -> Self {
        Self {
            coordinator,
            loader,
            running: tokio::sync::Mutex::new(()),
            stats: Mutex::new(JobStats::default()),
        }
    }

    /// Runs once unless a run is already in progress.
    pub async fn run_once(&self) -> JobResult {
        let result = match self.running.try_lock() {
            Ok(_guard) => {
                let start = Instant::now();
                match self.execute().await {
                    Ok(results) => JobResult::Success {
                        records: results.len(),
                        duration_ms: start.elapsed().as_millis() as u64,
                    },
                    Err(e) => {
                        error!(error = %e, "Scheduled prediction failed");
                        JobResult::Failed {
                            error: e.to_string(),
                            duration_ms: start.elapsed().as_millis() as u64,
                        }
                    }
                }
            }
            Err(_) => {
                warn!("Previous scheduled prediction still running, skipping");
                JobResult::Skipped {
                    reason: "previous run in progress".to_string(),
                }
            }
        };

        self.stats.lock().record(&result);
        result
    }

    async fn execute(&self) -> Result<Vec<PredictionResult>> {
        let records = self.loader.load()?;
        if records.is_empty() {
            info!(path = %self.loader.path().display(), "No sample records to score");
            return Ok(Vec::new());
        }

        let scores = self.coordinator.score(&records).await?;
        let results = PredictionResult::wrap(&records, &scores);
        for result in &results {
            info!(
                sample_id = %result.sample_id,
                probability = %result.probability_formatted(),
                "Scheduled prediction"
            );
            debug!(sample_id = %result.sample_id, features = %result.raw_features);
        }
        Ok(results)
    }

    /// Snapshot of the run statistics.
    pub fn stats(&self) -> JobStats {
        self.stats.lock().clone()
    }

    /// Runs on `interval` until `shutdown` fires.
    ///
    /// Each tick runs in its own task so a slow batch surfaces as skipped
    /// ticks instead of a delayed schedule. Runs still in flight at shutdown
    /// are aborted before the returned handle completes.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Scheduled prediction started");
            let mut ticker = tokio::time::interval(interval);
            let mut runs = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let job = Arc::clone(&self);
                        runs.spawn(async move { job.run_once().await });
                    }
                    Some(joined) = runs.join_next(), if !runs.is_empty() => {
                        if let Err(e) = joined {
                            error!(error = %e, "Scheduled prediction run panicked");
                        }
                    }
                    _ = shutdown.recv() => {
                        info!(in_flight = runs.len(), "Scheduled prediction shutting down");
                        break;
                    }
                }
            }

            runs.shutdown().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_stats() {
        let mut stats = JobStats::default();

        stats.record(&JobResult::Success {
            records: 20,
            duration_ms: 100,
        });
        stats.record(&JobResult::Success {
            records: 20,
            duration_ms: 200,
        });
        stats.record(&JobResult::Failed {
            error: "engine down".to_string(),
            duration_ms: 50,
        });
        stats.record(&JobResult::Skipped {
            reason: "busy".to_string(),
        });

        assert_eq!(stats.total_runs, 4);
        assert_eq!(stats.successful_runs, 2);
        assert_eq!(stats.failed_runs, 1);
        assert_eq!(stats.skipped_runs, 1);
        assert_eq!(stats.avg_duration_ms, 150.0);
        assert_eq!(stats.last_error.as_deref(), Some("engine down"));
        assert_eq!(stats.success_rate(), 0.5);
    }

    #[test]
    fn test_job_result() {
        assert!(JobResult::Success {
            records: 1,
            duration_ms: 1
        }
        .is_success());
        assert!(JobResult::Skipped {
            reason: String::new()
        }
        .is_skipped());
    }
}
