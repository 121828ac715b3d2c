//! Feature schemas: ordered columns and the parameters fitted at training time.

use crate::error::{Result, SluiceError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Sentinel token for blank and folded categorical values.
pub const UNK_MARKER: &str = "UNK";

/// Lower bound applied before `log1p` so the result stays finite.
pub const LOG1P_LOWER_BOUND: f64 = -0.999;

/// Floor for the standardisation divisor.
pub const MIN_SCALE: f64 = 1e-9;

/// Default code for categorical tokens absent from the code map.
pub const DEFAULT_CATEGORICAL_CODE: i64 = -1;

/// Trained parameters for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericFeatureParam {
    pub mean: f64,
    pub median: f64,
    /// Standard deviation of the log-transformed training values.
    pub scale: f64,
}

impl NumericFeatureParam {
    pub fn new(mean: f64, median: f64, scale: f64) -> Self {
        Self { mean, median, scale }
    }

    /// Divisor used for standardisation, never below [`MIN_SCALE`].
    pub fn effective_scale(&self) -> f64 {
        self.scale.max(MIN_SCALE)
    }

    /// The statistic selected as fallback and centre.
    pub fn center(&self, stat: CenterStatistic) -> f64 {
        match stat {
            CenterStatistic::Median => self.median,
            CenterStatistic::Mean => self.mean,
        }
    }
}

impl Default for NumericFeatureParam {
    fn default() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            scale: 1.0,
        }
    }
}

/// Trained parameters for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeatureParam {
    pub high_freq_values: HashSet<String>,
    pub code_map: HashMap<String, i64>,
    pub default_code: i64,
}

impl Default for CategoricalFeatureParam {
    fn default() -> Self {
        Self {
            high_freq_values: HashSet::new(),
            code_map: HashMap::new(),
            default_code: DEFAULT_CATEGORICAL_CODE,
        }
    }
}

/// How a record missing a schema column is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Warn and treat the column as blank.
    #[default]
    Lenient,
    /// Reject the record.
    Strict,
}

/// Statistic used both to fill missing numeric values and to centre them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenterStatistic {
    #[default]
    Median,
    Mean,
}

/// Per-version schema, immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_params: HashMap<String, NumericFeatureParam>,
    categorical_params: HashMap<String, CategoricalFeatureParam>,
    validation: ValidationMode,
    center: CenterStatistic,
}

impl FeatureSchema {
    /// Starts building a schema by hand.
    pub fn builder() -> FeatureSchemaBuilder {
        FeatureSchemaBuilder::default()
    }

    /// Validates a parsed schema document and freezes it.
    pub fn from_document(
        doc: SchemaDocument,
        validation: ValidationMode,
        center: CenterStatistic,
    ) -> Result<Self> {
        let numeric_columns = doc.config.numeric_columns;
        let categorical_columns = doc.config.categorical_columns;

        if numeric_columns.is_empty() && categorical_columns.is_empty() {
            return Err(SluiceError::Config(
                "schema declares no numeric or categorical columns".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in numeric_columns.iter().chain(categorical_columns.iter()) {
            if column.trim().is_empty() {
                return Err(SluiceError::Config("schema contains a blank column name".to_string()));
            }
            if !seen.insert(column.as_str()) {
                return Err(SluiceError::Config(format!(
                    "column {} is declared more than once",
                    column
                )));
            }
        }

        let mut numeric_params = HashMap::with_capacity(numeric_columns.len());
        for column in &numeric_columns {
            let param = match doc.numeric_params.get(column) {
                Some(raw) => raw.resolve(column)?,
                None => {
                    warn!(column = %column, "No numeric param found, using defaults");
                    NumericFeatureParam::default()
                }
            };
            numeric_params.insert(column.clone(), param);
        }

        let mut categorical_params = HashMap::with_capacity(categorical_columns.len());
        for column in &categorical_columns {
            let param = match doc.categorical_params.get(column) {
                Some(raw) => raw.resolve(),
                None => {
                    warn!(column = %column, "No categorical param found, using defaults");
                    CategoricalFeatureParam::default()
                }
            };
            categorical_params.insert(column.clone(), param);
        }

        let extra_numeric = doc
            .numeric_params
            .keys()
            .filter(|k| !numeric_params.contains_key(*k))
            .count();
        let extra_categorical = doc
            .categorical_params
            .keys()
            .filter(|k| !categorical_params.contains_key(*k))
            .count();
        if extra_numeric + extra_categorical > 0 {
            warn!(
                extra_numeric,
                extra_categorical, "Schema document has params for undeclared columns"
            );
        }

        Ok(Self {
            numeric_columns,
            categorical_columns,
            numeric_params,
            categorical_params,
            validation,
            center,
        })
    }

    /// Parses a JSON schema document.
    pub fn from_json(
        json: &str,
        validation: ValidationMode,
        center: CenterStatistic,
    ) -> Result<Self> {
        let doc: SchemaDocument = serde_json::from_str(json)
            .map_err(|e| SluiceError::Config(format!("Failed to parse schema document: {}", e)))?;
        Self::from_document(doc, validation, center)
    }

    /// Loads a JSON schema document from disk.
    pub fn from_file(
        path: &Path,
        validation: ValidationMode,
        center: CenterStatistic,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SluiceError::Config(format!("Failed to read schema file {}: {}", path.display(), e))
        })?;
        let schema = Self::from_json(&content, validation, center)?;
        info!(
            path = %path.display(),
            numeric = schema.numeric_columns.len(),
            categorical = schema.categorical_columns.len(),
            "Feature schema loaded"
        );
        Ok(schema)
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Output vector length: numeric columns followed by categorical columns.
    pub fn dimension(&self) -> usize {
        self.numeric_columns.len() + self.categorical_columns.len()
    }

    /// Every column in vector order.
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.numeric_columns.iter().chain(self.categorical_columns.iter())
    }

    pub fn numeric_param(&self, column: &str) -> Option<&NumericFeatureParam> {
        self.numeric_params.get(column)
    }

    pub fn categorical_param(&self, column: &str) -> Option<&CategoricalFeatureParam> {
        self.categorical_params.get(column)
    }

    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    pub fn center(&self) -> CenterStatistic {
        self.center
    }
}

/// Builder for schemas assembled in code.
#[derive(Debug, Default)]
pub struct FeatureSchemaBuilder {
    doc: SchemaDocument,
    validation: ValidationMode,
    center: CenterStatistic,
}

impl FeatureSchemaBuilder {
    /// Adds a numeric column with its parameters.
    pub fn numeric(mut self, column: &str, param: NumericFeatureParam) -> Self {
        self.doc.config.numeric_columns.push(column.to_string());
        self.doc.numeric_params.insert(
            column.to_string(),
            RawNumericParam {
                mean: Some(param.mean),
                median: Some(param.median),
                scale: Some(param.scale),
            },
        );
        self
    }

    /// Adds a categorical column with its parameters.
    pub fn categorical(mut self, column: &str, param: CategoricalFeatureParam) -> Self {
        self.doc.config.categorical_columns.push(column.to_string());
        self.doc.categorical_params.insert(
            column.to_string(),
            RawCategoricalParam {
                high_freq_values: Some(param.high_freq_values),
                code_map: Some(param.code_map),
                default_code: param.default_code,
            },
        );
        self
    }

    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    pub fn center(mut self, center: CenterStatistic) -> Self {
        self.center = center;
        self
    }

    pub fn build(self) -> Result<FeatureSchema> {
        FeatureSchema::from_document(self.doc, self.validation, self.center)
    }
}

/// Schema document as exported by the training pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub config: ColumnConfig,
    #[serde(default, rename = "num_params", alias = "numericParams")]
    pub numeric_params: HashMap<String, RawNumericParam>,
    #[serde(default, rename = "cat_params", alias = "categoricalParams")]
    pub categorical_params: HashMap<String, RawCategoricalParam>,
}

/// Declared column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default, rename = "num_cols", alias = "numericColumns")]
    pub numeric_columns: Vec<String>,
    #[serde(default, rename = "cat_cols", alias = "categoricalColumns")]
    pub categorical_columns: Vec<String>,
}

/// Numeric params as they appear in the document; any field may be null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNumericParam {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
}

impl RawNumericParam {
    fn resolve(&self, column: &str) -> Result<NumericFeatureParam> {
        let param = NumericFeatureParam {
            mean: self.mean.unwrap_or(0.0),
            median: self.median.unwrap_or(0.0),
            scale: self.scale.unwrap_or(1.0),
        };
        if !(param.mean.is_finite() && param.median.is_finite() && param.scale.is_finite()) {
            return Err(SluiceError::InvalidConfig {
                field: format!("num_params.{}", column),
                reason: "mean, median and scale must be finite".to_string(),
            });
        }
        Ok(param)
    }
}

/// Categorical params as they appear in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCategoricalParam {
    #[serde(default, rename = "high_freq", alias = "highFreqValues")]
    pub high_freq_values: Option<HashSet<String>>,
    #[serde(default, rename = "code_map", alias = "codeMap")]
    pub code_map: Option<HashMap<String, i64>>,
    #[serde(default = "default_code", alias = "defaultCode")]
    pub default_code: i64,
}

fn default_code() -> i64 {
    DEFAULT_CATEGORICAL_CODE
}

impl RawCategoricalParam {
    fn resolve(&self) -> CategoricalFeatureParam {
        CategoricalFeatureParam {
            high_freq_values: self.high_freq_values.clone().unwrap_or_default(),
            code_map: self.code_map.clone().unwrap_or_default(),
            default_code: self.default_code,
        }
    }
}

/// Frozen map from model version to schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    schemas: HashMap<String, Arc<FeatureSchema>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the schema for a version. Only used while building.
    pub fn insert(&mut self, version: &str, schema: FeatureSchema) {
        self.schemas.insert(version.to_string(), Arc::new(schema));
    }

    pub fn get(&self, version: &str) -> Result<Arc<FeatureSchema>> {
        self.schemas
            .get(version)
            .cloned()
            .ok_or_else(|| SluiceError::SchemaNotFound(version.to_string()))
    }

    pub fn contains(&self, version: &str) -> bool {
        self.schemas.contains_key(version)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "config": {"num_cols": ["I1", "I2"], "cat_cols": ["C1"]},
        "num_params": {
            "I1": {"mean": 1.5, "median": 1.0, "scale": 0.5},
            "I2": {"mean": null, "median": 2.0, "scale": null}
        },
        "cat_params": {
            "C1": {"high_freq": ["a", "b"], "code_map": {"a": 1, "b": 2, "UNK": 0}}
        }
    }"#;

    #[test]
    fn test_parse_training_export() {
        let schema =
            FeatureSchema::from_json(DOCUMENT, ValidationMode::Lenient, CenterStatistic::Median)
                .unwrap();

        assert_eq!(schema.dimension(), 3);
        assert_eq!(schema.numeric_columns(), ["I1", "I2"]);
        assert_eq!(schema.categorical_columns(), ["C1"]);

        let i2 = schema.numeric_param("I2").unwrap();
        assert_eq!(i2.mean, 0.0);
        assert_eq!(i2.median, 2.0);
        assert_eq!(i2.scale, 1.0);

        let c1 = schema.categorical_param("C1").unwrap();
        assert_eq!(c1.default_code, DEFAULT_CATEGORICAL_CODE);
        assert_eq!(c1.code_map.get("UNK"), Some(&0));
        assert!(c1.high_freq_values.contains("a"));
    }

    #[test]
    fn test_camel_case_aliases() {
        let json = r#"{
            "config": {"numericColumns": ["x"], "categoricalColumns": ["geo"]},
            "numericParams": {"x": {"mean": 0.0, "median": 0.0, "scale": 1.0}},
            "categoricalParams": {"geo": {"highFreqValues": ["US"], "codeMap": {"US": 3}, "defaultCode": 9}}
        }"#;
        let schema =
            FeatureSchema::from_json(json, ValidationMode::Strict, CenterStatistic::Mean).unwrap();

        assert_eq!(schema.validation(), ValidationMode::Strict);
        assert_eq!(schema.center(), CenterStatistic::Mean);
        assert_eq!(schema.categorical_param("geo").unwrap().default_code, 9);
    }

    #[test]
    fn test_missing_params_use_defaults() {
        let json = r#"{"config": {"num_cols": ["I1"], "cat_cols": ["C1"]}}"#;
        let schema =
            FeatureSchema::from_json(json, ValidationMode::Lenient, CenterStatistic::Median)
                .unwrap();

        assert_eq!(
            schema.numeric_param("I1"),
            Some(&NumericFeatureParam::default())
        );
        assert_eq!(
            schema.categorical_param("C1"),
            Some(&CategoricalFeatureParam::default())
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let json = r#"{"config": {"num_cols": ["x"], "cat_cols": ["x"]}}"#;
        let err = FeatureSchema::from_json(json, ValidationMode::Lenient, CenterStatistic::Median)
            .unwrap_err();
        assert!(matches!(err, SluiceError::Config(_)));
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = FeatureSchema::from_json("{}", ValidationMode::Lenient, CenterStatistic::Median)
            .unwrap_err();
        assert!(matches!(err, SluiceError::Config(_)));
    }

    #[test]
    fn test_effective_scale_floor() {
        let param = NumericFeatureParam::new(0.0, 0.0, 0.0);
        assert_eq!(param.effective_scale(), MIN_SCALE);
    }

    #[test]
    fn test_schema_store_lookup() {
        let mut store = SchemaStore::new();
        let schema = FeatureSchema::builder()
            .numeric("x", NumericFeatureParam::default())
            .build()
            .unwrap();
        store.insert("ctr_v1", schema);

        assert!(store.get("ctr_v1").is_ok());
        assert!(matches!(
            store.get("ctr_v2"),
            Err(SluiceError::SchemaNotFound(_))
        ));
    }
}
