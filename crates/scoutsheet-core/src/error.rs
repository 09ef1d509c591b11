use thiserror::Error;

use scoutsheet_parser::{DocumentError, GroundTruthError};

use crate::validation::{IntegrityError, Violation};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ground truth load failed: {0}")]
    GroundTruth(#[from] GroundTruthError),

    #[error("label document unusable: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("corrected document failed validation ({} violations)", violations.len())]
    Validation { violations: Vec<Violation> },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report rendering failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
