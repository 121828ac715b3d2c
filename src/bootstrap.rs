//! Startup wiring from configuration to a serving [`BatchCoordinator`].
//!
//! Each configured model version is loaded independently: a bad schema
//! document, a failed session or an invalid context skips that version and
//! the rest still serve.

use crate::compute::{
    BatchCoordinator, ConditionRouter, ModelContext, ModelRegistry, PredictionOrchestrator,
    ScoringEngine, SessionOptions,
};
use crate::config::{ModelConfig, SluiceConfig};
use crate::error::{Result, SluiceError};
use crate::features::{FeatureSchema, SchemaStore};
use crate::observability;
use crate::scheduling::{DelimitedSampleLoader, ScheduledPrediction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A model version that could not be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub version: String,
    pub reason: String,
}

/// Frozen model state produced at startup.
#[derive(Debug, Default)]
pub struct LoadedModels {
    pub registry: ModelRegistry,
    pub schemas: SchemaStore,
    pub skipped: Vec<SkippedModel>,
}

/// Loads every configured model version.
pub fn load_models(config: &SluiceConfig, engine: &dyn ScoringEngine) -> LoadedModels {
    let options = config.inference.session_options();
    let mut builder = ModelRegistry::builder();
    let mut schemas = SchemaStore::new();
    let mut skipped = Vec::new();

    for (version, model) in &config.models {
        match load_model(version, model, engine, &options) {
            Ok((context, schema)) => {
                if builder.register(version, context) {
                    schemas.insert(version, schema);
                } else {
                    skipped.push(SkippedModel {
                        version: version.clone(),
                        reason: "invalid model context".to_string(),
                    });
                    observability::record_model_skipped(version);
                }
            }
            Err(e) => {
                error!(version = %version, error = %e, "Failed to load model, skipping");
                skipped.push(SkippedModel {
                    version: version.clone(),
                    reason: e.to_string(),
                });
                observability::record_model_skipped(version);
            }
        }
    }

    LoadedModels {
        registry: builder.build(),
        schemas,
        skipped,
    }
}

fn load_model(
    version: &str,
    model: &ModelConfig,
    engine: &dyn ScoringEngine,
    options: &SessionOptions,
) -> Result<(ModelContext, FeatureSchema)> {
    if !model.enabled {
        return Err(SluiceError::ModelInvalid(format!("{} is disabled", version)));
    }

    let schema = FeatureSchema::from_file(&model.schema_path, model.validation, model.center)?;

    let session = engine
        .create_session(&model.path, options)
        .map_err(|e| SluiceError::Config(format!("Failed to create session for {}: {}", version, e)))?;

    let mut context = ModelContext::new(version, session)
        .with_nodes(&model.input_node, &model.output_node)
        .with_type(&model.model_type);
    context.model_name = model.name.clone().unwrap_or_else(|| version.to_string());
    context.model_version = model.version.clone();
    context.model_path = model.path.clone();
    context.description = model.description.clone();

    info!(
        version,
        path = %model.path,
        dimension = schema.dimension(),
        "Model loaded"
    );
    Ok((context, schema))
}

/// Builds the request-serving coordinator.
///
/// Fails only when models are configured and none of them loaded.
pub fn build_coordinator(
    config: &SluiceConfig,
    engine: Arc<dyn ScoringEngine>,
) -> Result<(BatchCoordinator, Vec<SkippedModel>)> {
    config.validate()?;

    let loaded = load_models(config, engine.as_ref());
    if loaded.registry.is_empty() && !config.models.is_empty() {
        return Err(SluiceError::Config(format!(
            "No model version could be loaded ({} configured)",
            config.models.len()
        )));
    }
    if !loaded.registry.contains(&config.routing.default_model) {
        warn!(
            default_model = %config.routing.default_model,
            "Default route target is not a loaded model; unmatched records will get the failure score"
        );
    }

    let orchestrator = PredictionOrchestrator::new(
        engine,
        Arc::new(loaded.registry),
        Arc::new(loaded.schemas),
    )
    .with_timeout(config.inference.timeout);
    let router = ConditionRouter::new(config.routing.clone());

    Ok((BatchCoordinator::new(router, orchestrator), loaded.skipped))
}

/// A running sluice instance.
pub struct Service {
    coordinator: Arc<BatchCoordinator>,
    skipped: Vec<SkippedModel>,
    scheduler: Option<(Arc<ScheduledPrediction>, JoinHandle<()>)>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Service {
    /// Loads models and starts the scheduled job when enabled.
    ///
    /// Must be called inside a tokio runtime when scheduling is enabled.
    pub fn start(config: &SluiceConfig, engine: Arc<dyn ScoringEngine>) -> Result<Self> {
        let (coordinator, skipped) = build_coordinator(config, engine)?;
        let coordinator = Arc::new(coordinator);
        let (shutdown_tx, _) = broadcast::channel(1);

        let scheduler = if config.schedule.enabled {
            let default_model = &config.routing.default_model;
            match coordinator.orchestrator().schemas().get(default_model) {
                Ok(schema) => {
                    let loader = DelimitedSampleLoader::from_schema(&config.schedule, &schema);
                    let job = Arc::new(ScheduledPrediction::new(Arc::clone(&coordinator), loader));
                    let handle =
                        Arc::clone(&job).spawn(config.schedule.interval, shutdown_tx.subscribe());
                    Some((job, handle))
                }
                Err(e) => {
                    warn!(error = %e, "Scheduled prediction disabled: no schema for the default model");
                    None
                }
            }
        } else {
            None
        };

        info!(
            models = coordinator.orchestrator().registry().len(),
            skipped = skipped.len(),
            scheduled = scheduler.is_some(),
            "Sluice started"
        );

        Ok(Self {
            coordinator,
            skipped,
            scheduler,
            shutdown_tx,
        })
    }

    pub fn coordinator(&self) -> &Arc<BatchCoordinator> {
        &self.coordinator
    }

    /// Versions skipped at startup.
    pub fn skipped(&self) -> &[SkippedModel] {
        &self.skipped
    }

    /// The scheduled job, when running.
    pub fn scheduled(&self) -> Option<&Arc<ScheduledPrediction>> {
        self.scheduler.as_ref().map(|(job, _)| job)
    }

    /// Stops the scheduled job and waits for its loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Some((_, handle)) = self.scheduler {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduled prediction task failed");
            }
        }
        info!("Sluice stopped");
    }
}
