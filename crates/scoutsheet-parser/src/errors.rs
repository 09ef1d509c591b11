use thiserror::Error;

use crate::ground_truth::RecordKey;

#[derive(Debug, Error)]
pub enum GroundTruthError {
    #[error("header row does not match the fixed column set: found {found:?}")]
    Schema { found: Vec<String> },

    #[error("duplicate key {key} at data row {row_index}")]
    DuplicateKey { key: RecordKey, row_index: usize },

    #[error("no usable rows remained after parsing")]
    EmptyTable,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed label document: {reason}")]
    Malformed { reason: String },
}
