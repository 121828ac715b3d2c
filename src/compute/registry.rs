// Model version registry

use super::engine::SessionHandle;
use crate::error::{Result, SluiceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Default input node name
pub const DEFAULT_INPUT_NODE: &str = "input";
/// Default output node name
pub const DEFAULT_OUTPUT_NODE: &str = "output";

/// Everything needed to score against one model version
#[derive(Debug, Clone)]
pub struct ModelContext {
    /// Unique model id
    pub model_id: String,
    /// Display name
    pub model_name: String,
    /// Version string
    pub model_version: String,
    /// Model type (CTR, DeepFM, ...)
    pub model_type: String,
    /// Input node name
    pub input_node: String,
    /// Output node name
    pub output_node: String,
    /// Engine session, owned by the scoring engine
    pub session: Option<SessionHandle>,
    /// Artifact path
    pub model_path: String,
    /// Whether the model may serve traffic
    pub enabled: bool,
    /// Description
    pub description: String,
    /// Load timestamp (ms since epoch)
    pub loaded_at: u64,
}

impl ModelContext {
    /// Creates a context with default node names
    pub fn new(model_id: &str, session: SessionHandle) -> Self {
        Self {
            model_id: model_id.to_string(),
            model_name: model_id.to_string(),
            model_version: "1.0".to_string(),
            model_type: "UNKNOWN".to_string(),
            input_node: DEFAULT_INPUT_NODE.to_string(),
            output_node: DEFAULT_OUTPUT_NODE.to_string(),
            session: Some(session),
            model_path: String::new(),
            enabled: true,
            description: String::new(),
            loaded_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }

    /// Sets node names
    pub fn with_nodes(mut self, input: &str, output: &str) -> Self {
        self.input_node = input.to_string();
        self.output_node = output.to_string();
        self
    }

    /// Sets the model type
    pub fn with_type(mut self, model_type: &str) -> Self {
        self.model_type = model_type.to_string();
        self
    }

    /// Sets the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Valid iff a session exists, both node names are non-blank, and enabled
    pub fn is_valid(&self) -> bool {
        self.session.is_some()
            && !self.input_node.trim().is_empty()
            && !self.output_node.trim().is_empty()
            && self.enabled
    }

    /// Static metadata for the model-info surface
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_id: self.model_id.clone(),
            model_name: self.model_name.clone(),
            model_version: self.model_version.clone(),
            model_type: self.model_type.clone(),
            input_node: self.input_node.clone(),
            output_node: self.output_node.clone(),
            model_path: self.model_path.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            valid: self.is_valid(),
            loaded_at: self.loaded_at,
            feature_dim: None,
        }
    }
}

/// Model metadata snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model_id: String,
    pub model_name: String,
    pub model_version: String,
    pub model_type: String,
    pub input_node: String,
    pub output_node: String,
    pub model_path: String,
    pub description: String,
    pub enabled: bool,
    pub valid: bool,
    pub loaded_at: u64,
    /// Feature vector length, when a schema is registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_dim: Option<usize>,
}

/// Collects contexts at startup; frozen into a [`ModelRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    contexts: HashMap<String, ModelContext>,
    skipped: Vec<String>,
}

impl RegistryBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context; invalid contexts are logged and skipped.
    ///
    /// Returns whether the context was accepted.
    pub fn register(&mut self, version: &str, context: ModelContext) -> bool {
        if !context.is_valid() {
            warn!(
                version,
                has_session = context.session.is_some(),
                input_node = %context.input_node,
                output_node = %context.output_node,
                enabled = context.enabled,
                "Skipping invalid model context"
            );
            self.skipped.push(version.to_string());
            return false;
        }

        info!(
            version,
            model_id = %context.model_id,
            model_type = %context.model_type,
            input_node = %context.input_node,
            output_node = %context.output_node,
            "Registered model"
        );
        if self.contexts.insert(version.to_string(), context).is_some() {
            warn!(version, "Replaced previously registered model context");
        }
        true
    }

    /// Versions rejected so far
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Freezes the registry
    pub fn build(self) -> ModelRegistry {
        if self.contexts.is_empty() {
            warn!("Model registry built with no models");
        }
        info!(
            models = self.contexts.len(),
            skipped = self.skipped.len(),
            "Model registry initialized"
        );
        ModelRegistry {
            contexts: self.contexts,
        }
    }
}

/// Read-only map from model version to context.
///
/// Built once through [`RegistryBuilder`] and shared behind an `Arc`; reads
/// need no locking. Replacing models means building a new registry.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    contexts: HashMap<String, ModelContext>,
}

impl ModelRegistry {
    /// Creates a builder
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up a version
    pub fn get(&self, version: &str) -> Result<&ModelContext> {
        let context = self
            .contexts
            .get(version)
            .ok_or_else(|| SluiceError::ModelNotFound {
                version: version.to_string(),
                available: self.versions(),
            })?;

        // Re-checked because `enabled` can be flipped by an admin rebuild.
        if !context.is_valid() {
            return Err(SluiceError::ModelInvalid(version.to_string()));
        }

        Ok(context)
    }

    /// Sorted list of registered versions
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.contexts.keys().cloned().collect();
        versions.sort();
        versions
    }

    /// Whether a version is registered
    pub fn contains(&self, version: &str) -> bool {
        self.contexts.contains_key(version)
    }

    /// Number of registered versions
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Metadata for one version
    pub fn model_info(&self, version: &str) -> Result<ModelInfo> {
        self.contexts
            .get(version)
            .map(ModelContext::info)
            .ok_or_else(|| SluiceError::ModelNotFound {
                version: version.to_string(),
                available: self.versions(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: &str) -> ModelContext {
        ModelContext::new(id, SessionHandle::new(id.to_string())).with_type("CTR")
    }

    #[test]
    fn test_registry_register() {
        let mut builder = ModelRegistry::builder();
        assert!(builder.register("ctr_v1", context("ctr_v1")));
        assert!(builder.register("ctr_v2", context("ctr_v2")));

        let registry = builder.build();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.versions(), vec!["ctr_v1", "ctr_v2"]);
        assert_eq!(registry.get("ctr_v1").unwrap().model_type, "CTR");
    }

    #[test]
    fn test_invalid_context_skipped() {
        let mut no_session = context("ctr_v1");
        no_session.session = None;

        let mut builder = ModelRegistry::builder();
        assert!(!builder.register("ctr_v1", no_session));
        assert!(!builder.register("ctr_v2", context("ctr_v2").with_nodes("input", "  ")));
        assert!(!builder.register("ctr_v3", context("ctr_v3").with_enabled(false)));
        assert!(builder.register("ctr_v4", context("ctr_v4")));
        assert_eq!(builder.skipped(), ["ctr_v1", "ctr_v2", "ctr_v3"]);

        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("ctr_v4").is_ok());
    }

    #[test]
    fn test_get_unknown_version() {
        let mut builder = ModelRegistry::builder();
        builder.register("ctr_v1", context("ctr_v1"));
        let registry = builder.build();

        match registry.get("ctr_v9") {
            Err(SluiceError::ModelNotFound { version, available }) => {
                assert_eq!(version, "ctr_v9");
                assert_eq!(available, vec!["ctr_v1"]);
            }
            other => panic!("expected ModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_get_invalid_context() {
        // Bypass the builder to simulate a context disabled after registration.
        let mut contexts = HashMap::new();
        contexts.insert("ctr_v1".to_string(), context("ctr_v1").with_enabled(false));
        let registry = ModelRegistry { contexts };

        assert!(matches!(
            registry.get("ctr_v1"),
            Err(SluiceError::ModelInvalid(_))
        ));
    }

    #[test]
    fn test_model_info() {
        let mut builder = ModelRegistry::builder();
        builder.register("ctr_v1", context("ctr_v1").with_nodes("features", "probability"));
        let registry = builder.build();

        let info = registry.model_info("ctr_v1").unwrap();
        assert_eq!(info.input_node, "features");
        assert_eq!(info.output_node, "probability");
        assert!(info.valid);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["modelId"], "ctr_v1");
        assert!(json.get("featureDim").is_none());
    }
}
