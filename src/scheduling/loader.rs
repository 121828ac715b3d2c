//! Delimited sample loading and result formatting for scheduled runs.

use crate::config::ScheduleConfig;
use crate::error::{Result, SluiceError};
use crate::features::{FeatureSchema, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Record key holding an optional caller-supplied sample id.
pub const SAMPLE_ID_FIELD: &str = "sampleId";

/// Reads records from a delimited text file.
///
/// Values map positionally onto `columns`. Empty lines are skipped and at
/// most `max_records` records are returned. Each record is stamped with a
/// `sampleId` of `sample_<n>`, counting loaded records from one.
#[derive(Debug, Clone)]
pub struct DelimitedSampleLoader {
    path: PathBuf,
    separator: String,
    columns: Vec<String>,
    max_records: usize,
}

impl DelimitedSampleLoader {
    /// Creates a loader.
    pub fn new(path: impl Into<PathBuf>, separator: &str, columns: Vec<String>) -> Self {
        Self {
            path: path.into(),
            separator: separator.to_string(),
            columns,
            max_records: 20,
        }
    }

    /// Creates a loader whose column order follows a schema's layout.
    pub fn from_schema(config: &ScheduleConfig, schema: &FeatureSchema) -> Self {
        Self::new(
            config.data_path.clone(),
            &config.separator,
            schema.columns().cloned().collect(),
        )
        .with_max_records(config.max_records)
    }

    /// Sets the record cap.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Loads up to `max_records` records.
    pub fn load(&self) -> Result<Vec<Record>> {
        if self.separator.is_empty() {
            return Err(SluiceError::InvalidConfig {
                field: "schedule.separator".to_string(),
                reason: "Separator must not be empty".to_string(),
            });
        }

        let file = std::fs::File::open(&self.path).map_err(|e| {
            SluiceError::Config(format!(
                "Failed to open sample file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut records = Vec::with_capacity(self.max_records);
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            if records.len() >= self.max_records {
                break;
            }
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let mut record = self.parse_line(line, line_no + 1);
            record
                .entry(SAMPLE_ID_FIELD.to_string())
                .or_insert_with(|| format!("sample_{}", records.len() + 1));
            records.push(record);
        }

        info!(
            path = %self.path.display(),
            loaded = records.len(),
            max_records = self.max_records,
            "Sample data loaded"
        );
        Ok(records)
    }

    fn parse_line(&self, line: &str, line_no: usize) -> Record {
        let values: Vec<&str> = line.split(self.separator.as_str()).collect();

        if values.len() < self.columns.len() {
            warn!(
                line = line_no,
                expected = self.columns.len(),
                actual = values.len(),
                "Sample row has too few fields, padding with blanks"
            );
        } else if values.len() > self.columns.len() {
            debug!(
                line = line_no,
                extra = values.len() - self.columns.len(),
                "Ignoring extra sample fields"
            );
        }

        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = values.get(i).copied().unwrap_or_default();
                (column.clone(), value.to_string())
            })
            .collect()
    }
}

/// One scored sample from a scheduled run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub sample_id: String,
    pub raw_features: String,
    pub probability: f64,
    pub predicted_at: DateTime<Utc>,
}

impl PredictionResult {
    /// Pairs records with their scores.
    ///
    /// The sample id comes from the record's `sampleId` field, else its index.
    pub fn wrap(records: &[Record], scores: &[f32]) -> Vec<PredictionResult> {
        let now = Utc::now();
        records
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(i, (record, &score))| PredictionResult {
                sample_id: record
                    .get(SAMPLE_ID_FIELD)
                    .cloned()
                    .unwrap_or_else(|| i.to_string()),
                raw_features: format!("{:?}", record.iter().collect::<BTreeMap<_, _>>()),
                probability: score as f64,
                predicted_at: now,
            })
            .collect()
    }

    /// Probability with four decimals; non-positive and non-finite values
    /// (including the failure score) print as `0.0000`.
    pub fn probability_formatted(&self) -> String {
        if !self.probability.is_finite() || self.probability <= 0.0 {
            return "0.0000".to_string();
        }
        format!("{:.4}", self.probability)
    }
}
