// Per-version prediction pipeline

use super::engine::{EngineError, ScoringEngine, Tensor};
use super::registry::ModelRegistry;
use crate::error::{Result, SluiceError};
use crate::features::{preprocess_batch, Record, SchemaStore};
use crate::observability;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Runs preprocess, engine call and output parsing for one model version
pub struct PredictionOrchestrator {
    /// Scoring engine
    engine: Arc<dyn ScoringEngine>,
    /// Frozen model registry
    registry: Arc<ModelRegistry>,
    /// Frozen schema store
    schemas: Arc<SchemaStore>,
    /// Deadline for one engine call
    timeout: Option<Duration>,
}

impl PredictionOrchestrator {
    /// Creates an orchestrator without an engine deadline
    pub fn new(
        engine: Arc<dyn ScoringEngine>,
        registry: Arc<ModelRegistry>,
        schemas: Arc<SchemaStore>,
    ) -> Self {
        Self {
            engine,
            registry,
            schemas,
            timeout: None,
        }
    }

    /// Sets the engine call deadline
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model registry
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Schema store
    pub fn schemas(&self) -> &Arc<SchemaStore> {
        &self.schemas
    }

    /// Scores `records` with `version`, one score per record in input order.
    pub async fn predict<R: Borrow<Record>>(&self, records: &[R], version: &str) -> Result<Vec<f32>> {
        if records.is_empty() {
            return Err(SluiceError::InvalidInput(
                "Feature data cannot be empty".to_string(),
            ));
        }

        let schema = self.schemas.get(version)?;
        let matrix = preprocess_batch(records, &schema)?;
        let context = self.registry.get(version)?;
        let session = context
            .session
            .as_ref()
            .ok_or_else(|| SluiceError::ModelInvalid(version.to_string()))?;

        let rows = matrix.rows();
        let shape = matrix.shape();
        let input = Tensor::new(matrix.into_data(), shape);

        let mut inputs = HashMap::with_capacity(1);
        inputs.insert(context.input_node.clone(), input);
        let output_names = [context.output_node.clone()];

        debug!(
            version,
            rows,
            session = session.id(),
            input_node = %context.input_node,
            "Running scoring engine"
        );

        let start = Instant::now();
        let call = self.engine.run(session, inputs, &output_names);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout(limit)),
            },
            None => call.await,
        };
        observability::record_inference(version, start.elapsed());

        let mut outputs = result.map_err(|source| {
            error!(version, error = %source, "Scoring engine call failed");
            SluiceError::Inference {
                version: version.to_string(),
                source,
            }
        })?;

        let output = outputs
            .remove(&context.output_node)
            .ok_or_else(|| SluiceError::Inference {
                version: version.to_string(),
                source: EngineError::MissingOutput(context.output_node.clone()),
            })?;

        parse_scores(&output, rows, version)
    }
}

/// Extracts one score per row from an engine output tensor.
///
/// `[N, k]` reads column 0, `[N]` is used as is. Any other rank, a zero-width
/// second dimension, or data that disagrees with the shape is rejected.
pub fn parse_scores(output: &Tensor, expected: usize, version: &str) -> Result<Vec<f32>> {
    let unsupported = || SluiceError::UnsupportedOutputShape {
        version: version.to_string(),
        shape: output.shape.clone(),
    };

    if output.element_count() != Some(output.data.len()) {
        return Err(unsupported());
    }

    let scores: Vec<f32> = match output.shape.as_slice() {
        [_] => output.data.clone(),
        [_, width] if *width > 0 => output
            .data
            .chunks_exact(*width as usize)
            .map(|row| row[0])
            .collect(),
        _ => return Err(unsupported()),
    };

    if scores.len() != expected {
        return Err(SluiceError::ResultCountMismatch {
            version: version.to_string(),
            expected,
            actual: scores.len(),
        });
    }

    Ok(scores)
}
