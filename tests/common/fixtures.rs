// Test fixtures for integration tests

use sluice::compute::{
    BatchCoordinator, ConditionRouter, ModelContext, ModelRegistry, PredictionOrchestrator,
    RoutingConfig, ScoringEngine, SessionOptions,
};
use sluice::features::{
    CategoricalFeatureParam, FeatureSchema, NumericFeatureParam, Record, SchemaStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Schema document in the training export layout
pub const SCHEMA_JSON: &str = r#"{
    "config": {
        "num_cols": ["I1", "I2"],
        "cat_cols": ["C1"]
    },
    "num_params": {
        "I1": {"mean": 3.0, "median": 0.0, "scale": 1.0},
        "I2": {"mean": 1.0, "median": 0.5, "scale": 2.0}
    },
    "cat_params": {
        "C1": {"high_freq": ["a", "b"], "code_map": {"a": 1, "b": 2, "UNK": 0}, "default_code": -1}
    }
}"#;

/// Builds a record from key/value pairs
pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `I1` passes through `log1p` unchanged in scale; `C1` folds to `UNK`
pub fn identity_schema() -> FeatureSchema {
    FeatureSchema::builder()
        .numeric("I1", NumericFeatureParam::new(0.0, 0.0, 1.0))
        .categorical(
            "C1",
            CategoricalFeatureParam {
                high_freq_values: ["a", "b"].iter().map(|s| s.to_string()).collect(),
                code_map: [("a", 1), ("b", 2), ("UNK", 0)]
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
                default_code: -1,
            },
        )
        .build()
        .expect("valid schema")
}

/// Score the identity schema yields for `I1 = x` under a first-feature engine
pub fn expected_score(x: f64) -> f32 {
    ((x.ln_1p() * 1e6).round() / 1e6) as f32
}

/// Routing with a country rule set over the given default
pub fn country_routing(default_model: &str) -> RoutingConfig {
    use sluice::compute::ConditionRule;

    RoutingConfig {
        enabled: true,
        default_model: default_model.to_string(),
        rules: vec![
            ConditionRule::new("us-mobile", "ctr_v2")
                .when("country", "US")
                .when("device", "mobile"),
            ConditionRule::new("us", "ctr_v3").when("country", "US"),
        ],
    }
}

/// Coordinator over `(version, model_path)` pairs, all on the identity schema
pub fn coordinator(
    engine: Arc<dyn ScoringEngine>,
    models: &[(&str, &str)],
    routing: RoutingConfig,
    timeout: Option<Duration>,
) -> BatchCoordinator {
    let mut builder = ModelRegistry::builder();
    let mut schemas = SchemaStore::new();

    for (version, path) in models {
        let session = engine
            .create_session(path, &SessionOptions::default())
            .expect("session");
        builder.register(version, ModelContext::new(version, session));
        schemas.insert(version, identity_schema());
    }

    let orchestrator =
        PredictionOrchestrator::new(engine, Arc::new(builder.build()), Arc::new(schemas))
            .with_timeout(timeout);
    BatchCoordinator::new(ConditionRouter::new(routing), orchestrator)
}

/// Writes a file under `dir` and returns its path
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}
