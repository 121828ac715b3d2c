//! Feature engineering for sluice
//!
//! Reproduces the offline transformation used at training time:
//! - Schema documents with trained numeric and categorical parameters
//! - Numeric log1p standardisation with robust fallbacks
//! - Categorical UNK folding and code lookup

pub mod preprocess;
pub mod schema;

pub use preprocess::{
    encode_categorical, preprocess_batch, preprocess_record, transform_numeric, validate_record,
    FeatureMatrix, Record,
};
pub use schema::{
    CategoricalFeatureParam, CenterStatistic, FeatureSchema, FeatureSchemaBuilder,
    NumericFeatureParam, SchemaDocument, SchemaStore, ValidationMode, MIN_SCALE, UNK_MARKER,
};
