//! Observability module for sluice.
//!
//! Provides logging initialisation and the metrics recorded on the serving
//! path. Metrics go through the `metrics` facade; without an installed
//! recorder they are no-ops, so embedding applications choose the exporter.

use crate::config::ObservabilityConfig;
use crate::error::{Result, SluiceError};
use metrics::{counter, histogram};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| SluiceError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| SluiceError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Record an inbound scoring request.
pub fn record_request(records: usize) {
    counter!("sluice_requests_total").increment(1);
    counter!("sluice_records_total").increment(records as u64);
}

/// Record a routed group that was sentinel-filled.
pub fn record_group_failure(version: &str, records: usize) {
    counter!("sluice_group_failures_total", "version" => version.to_string()).increment(1);
    counter!("sluice_sentinel_scores_total", "version" => version.to_string())
        .increment(records as u64);
}

/// Record a numeric value that fell back to the schema default.
pub fn record_feature_fallback(column: &str) {
    counter!("sluice_feature_fallbacks_total", "column" => column.to_string()).increment(1);
}

/// Record the latency of one scoring engine call.
pub fn record_inference(version: &str, elapsed: Duration) {
    histogram!("sluice_inference_seconds", "version" => version.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a model version skipped at startup.
pub fn record_model_skipped(version: &str) {
    counter!("sluice_models_skipped_total", "version" => version.to_string()).increment(1);
}
