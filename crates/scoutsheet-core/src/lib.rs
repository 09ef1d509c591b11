pub mod engine;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod validation;

pub use engine::{
    correct_document, CorrectionChange, CorrectionResult, GroupOutcome, GroupStatus,
};
pub use error::{PipelineError, Result};
pub use pipeline::{
    correct_documents, correct_single, CorrectedDocument, CorrectedFile, CorrectionBatch,
    DocumentInput, DocumentReport, DocumentStatus, RunSummary,
};
pub use validation::{validate, IntegrityError, Violation};
