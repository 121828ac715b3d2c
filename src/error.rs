//! Error types for sluice.
//!
//! This module provides a unified error type [`SluiceError`] for every
//! serving operation, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Configuration**: bad or missing schema documents and model artifacts.
//!   Fatal for the affected model version at startup, never for the others.
//! - **Validation**: malformed request input, surfaced to the caller.
//! - **Model lookup**: routing to an unregistered or misconfigured version.
//! - **Inference**: scoring engine failures and engine contract violations.
//!   Isolated per routed group and sentinel-filled by the batch coordinator.
//!
//! A single unparsable feature value is not an error at all: the preprocessor
//! recovers it locally with the schema's fallback and only logs it.
//!
//! # Example
//!
//! ```rust
//! use sluice::error::{ErrorCode, Result, SluiceError};
//!
//! fn check_batch(len: usize) -> Result<()> {
//!     if len == 0 {
//!         return Err(SluiceError::InvalidInput("feature data cannot be empty".into()));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_batch(0).unwrap_err();
//! assert_eq!(err.code(), ErrorCode::ParamError);
//! assert!(err.is_client_error());
//! ```

use crate::compute::engine::EngineError;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Main error type for sluice operations.
#[derive(Error, Debug)]
pub enum SluiceError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Request validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required feature column: {column}")]
    MissingFeature { column: String },

    // Model lookup errors
    #[error("Model not found: {version}. Available models: {available:?}")]
    ModelNotFound {
        version: String,
        available: Vec<String>,
    },

    #[error("Model context is invalid: {0}")]
    ModelInvalid(String),

    #[error("No feature schema registered for model: {0}")]
    SchemaNotFound(String),

    // Inference errors
    #[error("Model inference failed (version: {version}): {source}")]
    Inference {
        version: String,
        #[source]
        source: EngineError,
    },

    #[error("Unsupported output shape for version {version}: {shape:?}")]
    UnsupportedOutputShape { version: String, shape: Vec<i64> },

    #[error("Prediction count mismatch - Input: {expected}, Output: {actual} (Model version: {version})")]
    ResultCountMismatch {
        version: String,
        expected: usize,
        actual: usize,
    },

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Numeric error catalogue exposed at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SystemError,
    ParamError,
    ModelLoadFailed,
    ModelNotFound,
    ModelInferenceFailed,
    PreprocessorInitFailed,
    FeatureInvalid,
}

impl ErrorCode {
    /// Wire value of the code.
    pub fn as_u32(&self) -> u32 {
        match self {
            ErrorCode::SystemError => 10000,
            ErrorCode::ParamError => 10001,
            ErrorCode::ModelLoadFailed => 20000,
            ErrorCode::ModelNotFound => 20001,
            ErrorCode::ModelInferenceFailed => 20002,
            ErrorCode::PreprocessorInitFailed => 30000,
            ErrorCode::FeatureInvalid => 30001,
        }
    }

    /// Default human readable message.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::SystemError => "System internal error",
            ErrorCode::ParamError => "Invalid parameters",
            ErrorCode::ModelLoadFailed => "Model loading failed",
            ErrorCode::ModelNotFound => "Model not found",
            ErrorCode::ModelInferenceFailed => "Model inference failed",
            ErrorCode::PreprocessorInitFailed => "Preprocessing configuration initialization failed",
            ErrorCode::FeatureInvalid => "Invalid feature data",
        }
    }
}

impl SluiceError {
    /// Map to the boundary error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SluiceError::Config(_) | SluiceError::InvalidConfig { .. } => {
                ErrorCode::PreprocessorInitFailed
            }
            SluiceError::InvalidInput(_) => ErrorCode::ParamError,
            SluiceError::MissingFeature { .. } => ErrorCode::FeatureInvalid,
            SluiceError::ModelNotFound { .. } | SluiceError::SchemaNotFound(_) => {
                ErrorCode::ModelNotFound
            }
            SluiceError::ModelInvalid(_) => ErrorCode::ModelLoadFailed,
            SluiceError::Inference { .. }
            | SluiceError::UnsupportedOutputShape { .. }
            | SluiceError::ResultCountMismatch { .. } => ErrorCode::ModelInferenceFailed,
            SluiceError::Io(_) | SluiceError::Serialization(_) | SluiceError::Internal(_) => {
                ErrorCode::SystemError
            }
        }
    }

    /// Whether the caller sent something unusable (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SluiceError::InvalidInput(_)
                | SluiceError::MissingFeature { .. }
                | SluiceError::ModelNotFound { .. }
                | SluiceError::SchemaNotFound(_)
        )
    }

    /// Whether the error was raised by or about the scoring engine.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            SluiceError::Inference { .. }
                | SluiceError::UnsupportedOutputShape { .. }
                | SluiceError::ResultCountMismatch { .. }
        )
    }
}

impl From<serde_json::Error> for SluiceError {
    fn from(e: serde_json::Error) -> Self {
        SluiceError::Serialization(e.to_string())
    }
}

/// Result type alias for sluice operations.
pub type Result<T> = std::result::Result<T, SluiceError>;
