//! Record to feature-vector transformation.
//!
//! One general function set driven by a [`FeatureSchema`]: every model
//! version shares the same pipeline and differs only in its schema.
//!
//! Numeric columns: blank or unparsable values fall back to the schema's
//! centre statistic, then `log1p(max(x, -0.999))` is standardised against
//! the same statistic and rounded to six decimals. Categorical columns: blank
//! values and values outside the high-frequency set fold to `UNK` before the
//! code lookup.

use super::schema::{
    CategoricalFeatureParam, CenterStatistic, FeatureSchema, NumericFeatureParam, ValidationMode,
    LOG1P_LOWER_BOUND, UNK_MARKER,
};
use crate::error::{Result, SluiceError};
use crate::observability;
use std::borrow::Borrow;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One raw input sample: feature column to raw string value.
pub type Record = HashMap<String, String>;

const ROUNDING_FACTOR: f64 = 1e6;

/// Row-major `[rows, dim]` matrix of preprocessed features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Tensor shape `[rows, dim]`.
    pub fn shape(&self) -> Vec<i64> {
        vec![self.rows as i64, self.dim as i64]
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    /// Consumes the matrix into its flat row-major buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Preprocesses a batch, preserving input order.
///
/// Accepts owned records or borrowed ones (`&[Record]` and `&[&Record]`).
pub fn preprocess_batch<R: Borrow<Record>>(
    records: &[R],
    schema: &FeatureSchema,
) -> Result<FeatureMatrix> {
    let dim = schema.dimension();
    let mut data = Vec::with_capacity(records.len() * dim);

    for record in records {
        append_record(record.borrow(), schema, &mut data)?;
    }

    debug!(rows = records.len(), dim, "Batch preprocessing finished");
    Ok(FeatureMatrix {
        rows: records.len(),
        dim,
        data,
    })
}

/// Preprocesses a single record into a `[dim]` vector.
pub fn preprocess_record(record: &Record, schema: &FeatureSchema) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity(schema.dimension());
    append_record(record, schema, &mut out)?;
    Ok(out)
}

fn append_record(record: &Record, schema: &FeatureSchema, out: &mut Vec<f32>) -> Result<()> {
    validate_record(record, schema)?;

    for column in schema.numeric_columns() {
        let raw = record.get(column).map(String::as_str);
        let default_param = NumericFeatureParam::default();
        let param = schema.numeric_param(column).unwrap_or(&default_param);
        out.push(transform_numeric(raw, param, schema.center(), column));
    }

    for column in schema.categorical_columns() {
        let raw = record.get(column).map(String::as_str);
        let default_param = CategoricalFeatureParam::default();
        let param = schema.categorical_param(column).unwrap_or(&default_param);
        out.push(encode_categorical(raw, param) as f32);
    }

    Ok(())
}

/// Checks that every schema column is present according to the schema's mode.
pub fn validate_record(record: &Record, schema: &FeatureSchema) -> Result<()> {
    for column in schema.columns() {
        if record.contains_key(column) {
            continue;
        }
        match schema.validation() {
            ValidationMode::Strict => {
                return Err(SluiceError::MissingFeature {
                    column: column.clone(),
                });
            }
            ValidationMode::Lenient => {
                warn!(column = %column, "Missing feature, treating as blank");
            }
        }
    }
    Ok(())
}

/// Transforms one numeric value. Never fails: bad input uses the fallback.
pub fn transform_numeric(
    raw: Option<&str>,
    param: &NumericFeatureParam,
    stat: CenterStatistic,
    column: &str,
) -> f32 {
    let center = param.center(stat);

    let value = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => center,
        Some(text) => match text.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => parsed,
            _ => {
                warn!(
                    column,
                    value = text,
                    fallback = center,
                    "Unparsable numeric value, using fallback"
                );
                observability::record_feature_fallback(column);
                center
            }
        },
    };

    let logged = value.max(LOG1P_LOWER_BOUND).ln_1p();
    let standardized = (logged - center) / param.effective_scale();
    round_half_up(standardized) as f32
}

/// Encodes one categorical value to its trained integer code.
pub fn encode_categorical(raw: Option<&str>, param: &CategoricalFeatureParam) -> i64 {
    let token = match raw.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => UNK_MARKER,
    };

    let token = if !param.high_freq_values.is_empty() && !param.high_freq_values.contains(token) {
        UNK_MARKER
    } else {
        token
    };

    param
        .code_map
        .get(token)
        .copied()
        .unwrap_or(param.default_code)
}

/// Rounds to six decimals, ties away from zero.
fn round_half_up(value: f64) -> f64 {
    (value * ROUNDING_FACTOR).round() / ROUNDING_FACTOR
}
