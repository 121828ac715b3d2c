//! Configuration module for sluice.

use crate::compute::engine::{OptimizationLevel, SessionOptions};
use crate::compute::registry::{DEFAULT_INPUT_NODE, DEFAULT_OUTPUT_NODE};
use crate::compute::routing::RoutingConfig;
use crate::error::{Result, SluiceError};
use crate::features::{CenterStatistic, ValidationMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a sluice instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// Model versions keyed by version string.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    /// Routing rules.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Engine call configuration.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Scheduled smoke-test batches.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl SluiceConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SluiceError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| {
            SluiceError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// Per-model problems such as a missing artifact are left to bootstrap,
    /// which skips that version instead of failing startup.
    pub fn validate(&self) -> Result<()> {
        self.routing.validate()?;

        if self.schedule.max_records == 0 {
            return Err(SluiceError::InvalidConfig {
                field: "schedule.max_records".to_string(),
                reason: "Max records must be non-zero".to_string(),
            });
        }

        if self.schedule.separator.is_empty() {
            return Err(SluiceError::InvalidConfig {
                field: "schedule.separator".to_string(),
                reason: "Separator must not be empty".to_string(),
            });
        }

        if self.schedule.enabled && self.schedule.interval.is_zero() {
            return Err(SluiceError::InvalidConfig {
                field: "schedule.interval".to_string(),
                reason: "Interval must be non-zero".to_string(),
            });
        }

        if let Some(timeout) = self.inference.timeout {
            if timeout.is_zero() {
                return Err(SluiceError::InvalidConfig {
                    field: "inference.timeout".to_string(),
                    reason: "Timeout must be non-zero when set".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "ctr_v1".to_string(),
            ModelConfig {
                name: Some("criteo-ctr".to_string()),
                model_type: "CTR".to_string(),
                ..ModelConfig::new("models/ctr_v1.onnx", "models/ctr_v1_preprocessor.json")
            },
        );

        Self {
            models,
            routing: RoutingConfig {
                enabled: true,
                default_model: "ctr_v1".to_string(),
                rules: Vec::new(),
            },
            inference: InferenceConfig {
                timeout: Some(Duration::from_secs(5)),
                ..InferenceConfig::default()
            },
            schedule: ScheduleConfig::default(),
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

/// One model version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model artifact path handed to the scoring engine.
    pub path: String,
    /// Feature schema document.
    pub schema_path: PathBuf,
    /// Input node name.
    #[serde(default = "default_input_node")]
    pub input_node: String,
    /// Output node name.
    #[serde(default = "default_output_node")]
    pub output_node: String,
    /// Whether the version may serve traffic.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Display name; defaults to the version key.
    #[serde(default)]
    pub name: Option<String>,
    /// Model version label.
    #[serde(default = "default_model_version")]
    pub version: String,
    /// Model type (CTR, DeepFM, ...).
    #[serde(default = "default_model_type")]
    pub model_type: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Missing-column handling.
    #[serde(default)]
    pub validation: ValidationMode,
    /// Numeric centre statistic.
    #[serde(default)]
    pub center: CenterStatistic,
}

impl ModelConfig {
    /// Creates a config with defaults for everything but the paths.
    pub fn new(path: &str, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.to_string(),
            schema_path: schema_path.into(),
            input_node: default_input_node(),
            output_node: default_output_node(),
            enabled: true,
            name: None,
            version: default_model_version(),
            model_type: default_model_type(),
            description: String::new(),
            validation: ValidationMode::default(),
            center: CenterStatistic::default(),
        }
    }
}

fn default_input_node() -> String {
    DEFAULT_INPUT_NODE.to_string()
}

fn default_output_node() -> String {
    DEFAULT_OUTPUT_NODE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_model_version() -> String {
    "1.0".to_string()
}

fn default_model_type() -> String {
    "UNKNOWN".to_string()
}

/// Engine call configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Deadline for one engine call; none means wait indefinitely.
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    /// Inter-op thread hint; defaults to half the cores.
    #[serde(default)]
    pub inter_op_threads: Option<usize>,
    /// Intra-op thread hint; defaults to all cores.
    #[serde(default)]
    pub intra_op_threads: Option<usize>,
    /// Graph optimisation level.
    #[serde(default)]
    pub optimization: OptimizationLevel,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            inter_op_threads: None,
            intra_op_threads: None,
            optimization: OptimizationLevel::All,
        }
    }
}

impl InferenceConfig {
    /// Session options with unset hints filled from the host.
    pub fn session_options(&self) -> SessionOptions {
        let defaults = SessionOptions::default();
        SessionOptions {
            inter_op_threads: self
                .inter_op_threads
                .unwrap_or(defaults.inter_op_threads)
                .max(1),
            intra_op_threads: self
                .intra_op_threads
                .unwrap_or(defaults.intra_op_threads)
                .max(1),
            optimization: self.optimization,
        }
    }
}

/// Scheduled prediction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Enable the scheduled job.
    #[serde(default)]
    pub enabled: bool,
    /// Time between runs.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Delimited sample file.
    #[serde(default)]
    pub data_path: PathBuf,
    /// Field separator.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Maximum records loaded per run.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_separator() -> String {
    "\t".to_string()
}

fn default_max_records() -> usize {
    20
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
            data_path: PathBuf::from("data/sample.txt"),
            separator: default_separator(),
            max_records: default_max_records(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Enable JSON logging.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            let minutes = m.parse::<u64>().map_err(|e| e.to_string())?;
            minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("duration of {} minutes is too large", minutes))
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }

    /// Same format for `Option<Duration>`; `null` means unset.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
