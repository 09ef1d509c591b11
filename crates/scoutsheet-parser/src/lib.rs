pub mod errors;
pub mod ground_truth;
pub mod labels;

pub use errors::{DocumentError, GroundTruthError};
pub use ground_truth::{GroundTruthTable, Measurement, RecordKey, SENTINEL};
pub use labels::{
    FieldName, LabelDocument, LabelEntry, LabelPath, Occurrence, SetFieldOutcome,
};
