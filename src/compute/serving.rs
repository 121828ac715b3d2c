// Request-level scoring entry point

use super::inference::PredictionOrchestrator;
use super::registry::ModelInfo;
use super::routing::{ConditionRouter, RouteGroup};
use crate::error::{Result, SluiceError};
use crate::features::Record;
use crate::observability;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Score written for records whose group failed
pub const PREDICTION_FAILURE_SCORE: f32 = -1.0;

/// Scoring request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    /// Caller correlation id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
    /// Raw feature records
    #[serde(alias = "featureData")]
    pub features: Vec<Record>,
}

impl PredictionRequest {
    pub fn new(features: Vec<Record>) -> Self {
        Self {
            request_id: None,
            features,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

/// Scoring response; `scores[i]` belongs to `features[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub request_id: String,
    pub scores: Vec<f32>,
}

/// Liveness report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub models_loaded: usize,
    pub schemas_loaded: usize,
    pub routing_enabled: bool,
    pub default_model: String,
    /// Whether the default route points at a registered model
    pub default_model_ready: bool,
    pub uptime_seconds: u64,
    pub checked_at: DateTime<Utc>,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Routes a batch, scores every group, and merges scores back by index
pub struct BatchCoordinator {
    router: ConditionRouter,
    orchestrator: PredictionOrchestrator,
    started_at: Instant,
}

impl BatchCoordinator {
    /// Creates a coordinator
    pub fn new(router: ConditionRouter, orchestrator: PredictionOrchestrator) -> Self {
        Self {
            router,
            orchestrator,
            started_at: Instant::now(),
        }
    }

    /// Router
    pub fn router(&self) -> &ConditionRouter {
        &self.router
    }

    /// Orchestrator
    pub fn orchestrator(&self) -> &PredictionOrchestrator {
        &self.orchestrator
    }

    /// Scores a batch.
    ///
    /// Groups run concurrently. A failing group is logged and its records get
    /// [`PREDICTION_FAILURE_SCORE`]; the other groups are unaffected.
    pub async fn score(&self, records: &[Record]) -> Result<Vec<f32>> {
        if records.is_empty() {
            return Err(SluiceError::InvalidInput(
                "Feature data cannot be empty".to_string(),
            ));
        }
        observability::record_request(records.len());

        let groups = self.router.group(records);
        let results = join_all(groups.iter().map(|group| self.score_group(group))).await;

        let mut scores = vec![PREDICTION_FAILURE_SCORE; records.len()];
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(group_scores) => {
                    for ((index, _), score) in group.entries.iter().zip(group_scores) {
                        scores[*index] = score;
                    }
                }
                Err(e) => {
                    error!(
                        version = %group.version,
                        records = group.len(),
                        error = %e,
                        code = e.code().as_u32(),
                        "Group prediction failed, using failure score"
                    );
                    observability::record_group_failure(&group.version, group.len());
                }
            }
        }

        Ok(scores)
    }

    async fn score_group(&self, group: &RouteGroup<'_>) -> Result<Vec<f32>> {
        let records = group.records();
        self.orchestrator.predict(&records, &group.version).await
    }

    /// Handles a request, generating a request id when absent
    pub async fn handle(&self, request: PredictionRequest) -> Result<PredictionResponse> {
        let request_id = request
            .request_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let start = Instant::now();
        let scores = self.score(&request.features).await.map_err(|e| {
            warn!(request_id = %request_id, error = %e, "Prediction request rejected");
            e
        })?;

        info!(
            request_id = %request_id,
            records = scores.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prediction request served"
        );
        Ok(PredictionResponse { request_id, scores })
    }

    /// Metadata for one model version
    pub fn model_info(&self, version: &str) -> Result<ModelInfo> {
        let mut info = self.orchestrator.registry().model_info(version)?;
        info.feature_dim = self
            .orchestrator
            .schemas()
            .get(version)
            .ok()
            .map(|schema| schema.dimension());
        Ok(info)
    }

    /// Liveness report
    pub fn health(&self) -> ServiceHealth {
        let registry = self.orchestrator.registry();
        let routing = self.router.config();
        let default_model_ready = registry.get(&routing.default_model).is_ok();

        let status = if registry.is_empty() {
            HealthStatus::Unhealthy
        } else if default_model_ready {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        ServiceHealth {
            status,
            models_loaded: registry.len(),
            schemas_loaded: self.orchestrator.schemas().len(),
            routing_enabled: routing.enabled,
            default_model: routing.default_model.clone(),
            default_model_ready,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            checked_at: Utc::now(),
        }
    }
}
