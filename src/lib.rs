//! Sluice - feature preprocessing and model routing in front of a scoring engine.
//!
//! Sluice takes raw string-keyed feature records, reproduces the feature
//! engineering used at training time, picks which trained model version scores
//! each record, calls an external scoring engine (ONNX Runtime or similar) and
//! returns one score per record in the original order.
//!
//! # Features
//!
//! - **Schema-driven preprocessing**: one transformation pipeline shared by
//!   every model version, parameterised by a JSON schema document.
//! - **Condition routing**: ordered first-match rules over record fields.
//! - **Failure isolation**: a failing model version only affects its own
//!   records, which get a sentinel score.
//! - **Scheduled smoke tests**: periodic scoring of a sample file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Sluice                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BatchCoordinator: route | score groups | merge by index    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ConditionRouter          │  PredictionOrchestrator         │
//! ├───────────────────────────┼─────────────────────────────────┤
//! │  FeatureSchema / Preprocessor  │  ModelRegistry             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScoringEngine (external)                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sluice::compute::ScoringEngine;
//! use sluice::config::SluiceConfig;
//!
//! # async fn example(engine: Arc<dyn ScoringEngine>) -> sluice::Result<()> {
//! let config = SluiceConfig::development();
//! let service = sluice::start(&config, engine)?;
//!
//! let scores = service.coordinator().score(&[sluice::Record::new()]).await?;
//! assert_eq!(scores.len(), 1);
//!
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod compute;
pub mod config;
pub mod error;
pub mod features;
pub mod observability;
pub mod scheduling;

// Re-exports
pub use bootstrap::{build_coordinator, load_models, Service, SkippedModel};
pub use compute::{BatchCoordinator, PredictionRequest, PredictionResponse};
pub use error::{ErrorCode, Result, SluiceError};
pub use features::{FeatureSchema, Record};

use compute::ScoringEngine;
use config::SluiceConfig;
use std::sync::Arc;
use tracing::info;

/// Initialise logging and start a sluice instance.
///
/// Embedders that install their own subscriber should call
/// [`Service::start`] directly.
pub fn start(config: &SluiceConfig, engine: Arc<dyn ScoringEngine>) -> Result<Service> {
    observability::init(&config.observability)?;
    info!(models = config.models.len(), "Starting sluice");
    Service::start(config, engine)
}
