//! Model serving for sluice
//!
//! Provides the path from raw records to scores:
//! - Scoring engine boundary and session handles
//! - Model version registry
//! - Condition-based routing
//! - Per-version prediction and batch coordination

pub mod engine;
pub mod inference;
pub mod registry;
pub mod routing;
pub mod serving;

pub use engine::{
    EngineError, OptimizationLevel, ScoringEngine, SessionHandle, SessionOptions, Tensor,
};
pub use inference::{parse_scores, PredictionOrchestrator};
pub use registry::{ModelContext, ModelInfo, ModelRegistry, RegistryBuilder};
pub use routing::{Condition, ConditionRouter, ConditionRule, RouteGroup, RoutingConfig};
pub use serving::{
    BatchCoordinator, HealthStatus, PredictionRequest, PredictionResponse, ServiceHealth,
    PREDICTION_FAILURE_SCORE,
};
